use std::collections::BTreeMap;

use crate::detect::Detection;

/// Rough per-class detection counts across a run.
///
/// Counts are per-frame sums: the same object seen on ten frames counts ten
/// times. Informational only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionTally {
    counts: BTreeMap<String, u64>,
}

impl DetectionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, detections: &[Detection]) {
        for detection in detections {
            *self.counts.entry(detection.label().to_string()).or_insert(0) += 1;
        }
    }

    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Labels and counts in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }

    /// Human-readable summary printed at exit.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No detections recorded (try lowering --conf).".to_string();
        }
        let mut out = String::from("Detection counts (rough):");
        for (label, count) in self.iter() {
            out.push_str(&format!("\n  {}: {}", label, count));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[test]
    fn counts_accumulate_per_frame() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let mut tally = DetectionTally::new();
        tally.record(&[Detection::new(0, 0.9, b), Detection::new(2, 0.5, b)]);
        tally.record(&[Detection::new(0, 0.8, b)]);

        assert_eq!(tally.get("person"), 2);
        assert_eq!(tally.get("car"), 1);
        assert_eq!(tally.get("dog"), 0);
        assert_eq!(tally.total(), 3);
        assert_eq!(
            tally.summary(),
            "Detection counts (rough):\n  car: 1\n  person: 2"
        );
    }

    #[test]
    fn empty_summary_suggests_lower_threshold() {
        assert!(DetectionTally::new().summary().contains("--conf"));
    }
}
