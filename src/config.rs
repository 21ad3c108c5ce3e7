use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_SOURCE: &str = "data/input.mp4";
const DEFAULT_MODEL: &str = "yolov8n.onnx";
const DEFAULT_CONFIDENCE: f32 = 0.35;
const DEFAULT_IOU: f32 = 0.45;
/// Saved video when no output path is given. Encoded builds write MP4.
#[cfg(feature = "encode-ffmpeg")]
pub const DEFAULT_OUTPUT_PATH: &str = "outputs/annotated.mp4";
#[cfg(not(feature = "encode-ffmpeg"))]
pub const DEFAULT_OUTPUT_PATH: &str = "outputs/annotated.y4m";

/// Minimum confidence a detection needs to be rendered. Always within `[0, 1]`.
///
/// Only `Threshold::new` builds one:
///
/// ```compile_fail
/// let _t = detect_annotate::Threshold(1.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(anyhow!("threshold must be within [0, 1], got {}", value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Inclusive: a confidence equal to the threshold passes. NaN never passes.
    pub fn admits(self, confidence: f32) -> bool {
        confidence >= self.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Local video file.
    File(PathBuf),
    /// Live capture device node, e.g. `/dev/video0`.
    Device(String),
    /// Deterministic generated frames (`stub://name?frames=N`).
    Synthetic(String),
}

impl SourceDescriptor {
    /// All-digit strings are camera indices, `stub://` is synthetic, anything
    /// else with a URL scheme is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if raw.starts_with("stub://") {
            return Ok(Self::Synthetic(raw.to_string()));
        }
        if raw.contains("://") {
            return Err(anyhow!(
                "source only supports local files, devices, or stub:// (got {})",
                raw
            ));
        }
        if raw.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self::Device(format!("/dev/video{}", raw)));
        }
        if raw.starts_with("/dev/video") {
            return Ok(Self::Device(raw.to_string()));
        }
        Ok(Self::File(PathBuf::from(raw)))
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Device(device) => write!(f, "{}", device),
            Self::Synthetic(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    source: Option<String>,
    backend: Option<String>,
    model: Option<PathBuf>,
    confidence: Option<f32>,
    iou: Option<f32>,
    save: Option<bool>,
    output: Option<PathBuf>,
    preview: Option<PathBuf>,
    headless: Option<bool>,
}

/// Values supplied on the command line. `None` keeps the file/env value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub source: Option<String>,
    pub backend: Option<String>,
    pub model: Option<PathBuf>,
    pub confidence: Option<f32>,
    pub iou: Option<f32>,
    pub save: bool,
    pub output: Option<PathBuf>,
    pub preview: Option<PathBuf>,
    /// Never open a window, even when built with `display-opencv`.
    pub headless: bool,
}

/// Run configuration. Built once at startup and read-only afterwards.
///
/// ```compile_fail
/// let mut cfg = detect_annotate::AnnotateConfig::for_source("stub://x", 0.5).unwrap();
/// cfg.iou = 0.9;
/// ```
#[derive(Debug, Clone)]
pub struct AnnotateConfig {
    source: SourceDescriptor,
    backend: Option<String>,
    model: PathBuf,
    threshold: Threshold,
    iou: f32,
    output: Option<PathBuf>,
    preview: Option<PathBuf>,
    headless: bool,
}

impl AnnotateConfig {
    /// Layering: defaults, then the JSON config file (`--config` or
    /// `ANNOTATE_CONFIG`), then `ANNOTATE_*` variables, then CLI overrides.
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var("ANNOTATE_CONFIG").ok().map(PathBuf::from));
        let mut file = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => AnnotateConfigFile::default(),
        };
        apply_env(&mut file)?;
        apply_overrides(&mut file, overrides);
        Self::from_file(file)
    }

    /// Configuration for a given source and threshold with every other value defaulted.
    pub fn for_source(source: &str, threshold: f32) -> Result<Self> {
        Self::from_file(AnnotateConfigFile {
            source: Some(source.to_string()),
            confidence: Some(threshold),
            ..AnnotateConfigFile::default()
        })
    }

    fn from_file(file: AnnotateConfigFile) -> Result<Self> {
        let source = SourceDescriptor::parse(file.source.as_deref().unwrap_or(DEFAULT_SOURCE))?;
        let threshold = Threshold::new(file.confidence.unwrap_or(DEFAULT_CONFIDENCE))?;
        let iou = file.iou.unwrap_or(DEFAULT_IOU);
        if !iou.is_finite() || !(0.0..=1.0).contains(&iou) {
            return Err(anyhow!("iou threshold must be within [0, 1], got {}", iou));
        }
        let output = if file.save.unwrap_or(false) {
            Some(
                file.output
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            )
        } else {
            None
        };
        let backend = file.backend.filter(|name| !name.trim().is_empty());
        Ok(Self {
            source,
            backend,
            model: file.model.unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL)),
            threshold,
            iou,
            output,
            preview: file.preview,
            headless: file.headless.unwrap_or(false),
        })
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    /// Explicitly requested detector backend, if any.
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    pub fn model(&self) -> &Path {
        &self.model
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn iou(&self) -> f32 {
        self.iou
    }

    /// Output stream path; `Some` only when saving was requested.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn preview(&self) -> Option<&Path> {
        self.preview.as_deref()
    }

    /// No window: frames go to the preview file, if any, or nowhere.
    pub fn headless(&self) -> bool {
        self.headless
    }
}

fn apply_env(file: &mut AnnotateConfigFile) -> Result<()> {
    if let Some(source) = non_empty_env("ANNOTATE_SOURCE") {
        file.source = Some(source);
    }
    if let Some(model) = non_empty_env("ANNOTATE_MODEL") {
        file.model = Some(PathBuf::from(model));
    }
    if let Some(output) = non_empty_env("ANNOTATE_OUTPUT") {
        file.output = Some(PathBuf::from(output));
    }
    if let Some(flag) = non_empty_env("ANNOTATE_HEADLESS") {
        file.headless = Some(!matches!(flag.trim(), "0" | "false" | "no"));
    }
    if let Some(conf) = non_empty_env("ANNOTATE_CONF") {
        let value: f32 = conf
            .parse()
            .map_err(|_| anyhow!("ANNOTATE_CONF must be a number between 0 and 1"))?;
        file.confidence = Some(value);
    }
    if let Some(iou) = non_empty_env("ANNOTATE_IOU") {
        let value: f32 = iou
            .parse()
            .map_err(|_| anyhow!("ANNOTATE_IOU must be a number between 0 and 1"))?;
        file.iou = Some(value);
    }
    Ok(())
}

fn apply_overrides(file: &mut AnnotateConfigFile, overrides: ConfigOverrides) {
    if overrides.source.is_some() {
        file.source = overrides.source;
    }
    if overrides.backend.is_some() {
        file.backend = overrides.backend;
    }
    if overrides.model.is_some() {
        file.model = overrides.model;
    }
    if overrides.confidence.is_some() {
        file.confidence = overrides.confidence;
    }
    if overrides.iou.is_some() {
        file.iou = overrides.iou;
    }
    if overrides.save {
        file.save = Some(true);
    }
    if overrides.output.is_some() {
        file.output = overrides.output;
    }
    if overrides.preview.is_some() {
        file.preview = overrides.preview;
    }
    if overrides.headless {
        file.headless = Some(true);
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<AnnotateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
