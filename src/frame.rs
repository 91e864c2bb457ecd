use std::fmt;

/// One contiguous plane of a multi-planar camera frame.
///
/// `row_stride` may exceed the payload width when the driver pads rows; the
/// converter reads only the leading payload bytes of each row.
pub struct Plane {
    pub bytes: Vec<u8>,
    pub row_stride: usize,
}

impl Plane {
    pub fn new(bytes: Vec<u8>, row_stride: usize) -> Self {
        Plane { bytes, row_stride }
    }

    /// Tightly packed plane: stride equals the row width.
    pub fn packed(bytes: Vec<u8>, width: usize) -> Self {
        Plane::new(bytes, width)
    }
}

/// A single captured frame in its native 4:2:0 planar layout.
///
/// Two layouts occur depending on how the capture pipeline is configured:
/// three planes (full-resolution luma plus separate quarter-resolution U and
/// V planes) or two planes (luma plus one interleaved U,V chroma plane).
///
/// Frames borrowed from a camera subsystem must be handed back exactly once.
/// The optional release hook runs from `Drop`, so the hand-back happens on
/// every exit path and cannot run twice.
pub struct CameraFrame {
    width: u32,
    height: u32,
    planes: Vec<Plane>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl CameraFrame {
    pub fn new(width: u32, height: u32, planes: Vec<Plane>) -> Self {
        assert!(width > 0 && height > 0, "frame dimensions must be positive");
        assert!(
            planes.len() == 2 || planes.len() == 3,
            "expected 2 or 3 planes, got {}",
            planes.len()
        );
        CameraFrame {
            width,
            height,
            planes,
            release: None,
        }
    }

    /// Attaches the hook that returns this frame to its producer.
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }
}

impl Drop for CameraFrame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("planes", &self.planes.len())
            .finish()
    }
}
