use thiserror::Error;

/// Landmark indices in the hand-landmark model's output order.
#[allow(dead_code)]
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

pub const LANDMARK_COUNT: usize = 21;

/// Fingertip landmarks paired with the joint one step proximal, for the four
/// non-thumb fingers.
const FINGER_TIP_PIP_PAIRS: [(usize, usize); 4] = [
    (index::INDEX_TIP, index::INDEX_PIP),
    (index::MIDDLE_TIP, index::MIDDLE_PIP),
    (index::RING_TIP, index::RING_PIP),
    (index::PINKY_TIP, index::PINKY_PIP),
];

/// One named point of a detected hand. `x` and `y` are normalized to [0,1]
/// relative to the source image; `y` grows downward. `z` is model-relative
/// depth and is ignored by the finger heuristics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected {LANDMARK_COUNT} landmarks, got {got}")]
pub struct LandmarkCountError {
    pub got: usize,
}

/// The full 21-point skeleton of one detected hand, in model output order.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks([Landmark; LANDMARK_COUNT]);

impl HandLandmarks {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Self {
        HandLandmarks(points)
    }

    pub fn from_slice(points: &[Landmark]) -> Result<Self, LandmarkCountError> {
        let points: [Landmark; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| LandmarkCountError { got: points.len() })?;
        Ok(HandLandmarks(points))
    }

    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.0
    }
}

impl std::ops::Index<usize> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, i: usize) -> &Landmark {
        &self.0[i]
    }
}

/// Counts extended fingers, 0 through 5.
///
/// The thumb compares tip against the IP joint on the x axis only, which
/// assumes a palm-facing hand with fingers pointing up and misreads rotated
/// hands. That is the behavior callers expect; do not switch it to a y
/// comparison. The other four fingers are extended when the tip sits above
/// (smaller y than) the PIP joint. Ties count as not extended.
pub fn count_extended_fingers(hand: &HandLandmarks) -> u32 {
    let mut count = 0;

    if hand[index::THUMB_TIP].x > hand[index::THUMB_IP].x {
        count += 1;
    }

    for (tip, pip) in FINGER_TIP_PIP_PAIRS {
        if hand[tip].y < hand[pip].y {
            count += 1;
        }
    }

    count
}

/// Euclidean distance between two landmarks in the image plane. Depth is
/// ignored.
pub fn distance(a: Landmark, b: Landmark) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}
