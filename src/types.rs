use crate::hand::HandLandmarks;

/// A decoded raster frame, 8-bit RGB, tightly packed.
#[derive(Clone, Debug)]
pub struct RgbFrame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbFrame {
    #[allow(dead_code)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) as usize) * 3;
        self.rgb.get(idx..idx + 3).map(|px| [px[0], px[1], px[2]])
    }
}

/// Encode quality for the YUV round trip. Stills get full fidelity; the live
/// path trades quality for per-frame CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fidelity {
    Preview,
    Still,
}

impl Fidelity {
    pub fn jpeg_quality(self) -> u8 {
        match self {
            Fidelity::Preview => 50,
            Fidelity::Still => 100,
        }
    }
}

/// What the pipeline tells its consumer after each processed frame.
///
/// The finger count covers the first detected hand only; `hands` holds the
/// landmark sequences it was computed from. `error` carries the most recent
/// per-frame failure, if any; per-frame failures never stop the stream.
/// Reports are ephemeral, recomputed per frame and never persisted.
#[derive(Clone, Debug, Default)]
pub struct HandReport {
    pub hands_detected: usize,
    pub extended_fingers: u32,
    pub hands: Vec<HandLandmarks>,
    pub error: Option<String>,
    pub timestamp_ms: i64,
}

/// One detection result from the landmark engine: zero or more hands plus the
/// dimensions of the image they were detected in, for re-projection.
#[derive(Clone, Debug)]
pub struct Detection {
    pub hands: Vec<HandLandmarks>,
    pub image_width: u32,
    pub image_height: u32,
}

impl Detection {
    pub fn empty(image_width: u32, image_height: u32) -> Self {
        Detection {
            hands: Vec::new(),
            image_width,
            image_height,
        }
    }
}
