// Frame pixels are only reachable through the read-only accessor.
use detect_annotate::Frame;

fn main() {
    let mut frame = Frame::new(vec![0u8; 3], 1, 1, 0).unwrap();
    frame.data.clear();
}
