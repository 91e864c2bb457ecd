use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{InitError, LandmarkEngine};
use crate::{
    hand::{HandLandmarks, LANDMARK_COUNT, Landmark},
    types::{Detection, RgbFrame},
};

const INPUT_SIZE: u32 = 224;

/// ONNX Runtime binding for a MediaPipe-style handpose model: 224x224
/// letterboxed RGB in, 21 landmarks plus a presence score out.
///
/// The model locates a single hand per image, so detections carry at most one
/// hand regardless of `max_hands`.
pub struct OrtHandEngine {
    session: Session,
    min_confidence: f32,
    last_timestamp_ms: i64,
}

impl OrtHandEngine {
    pub fn load(model_path: &Path) -> Result<Self, InitError> {
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.with_intra_threads(2))
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|source| InitError {
                path: model_path.to_path_buf(),
                source,
            })?;

        log::info!("handpose model ready from {}", model_path.display());
        Ok(OrtHandEngine {
            session,
            min_confidence: 0.5,
            last_timestamp_ms: i64::MIN,
        })
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl LandmarkEngine for OrtHandEngine {
    fn detect(&mut self, image: &RgbFrame, timestamp_ms: i64) -> Result<Detection> {
        debug_assert!(
            timestamp_ms >= self.last_timestamp_ms,
            "timestamps must not go backwards"
        );
        self.last_timestamp_ms = timestamp_ms;

        let (input, letterbox) = prepare_input(image)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run handpose session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flat: Vec<f32> = coords.iter().copied().collect();

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        if confidence < self.min_confidence {
            return Ok(Detection::empty(image.width, image.height));
        }

        let hand = decode_landmarks(&flat, &letterbox)?;
        Ok(Detection {
            hands: vec![hand],
            image_width: image.width,
            image_height: image.height,
        })
    }
}

struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    orig_w: u32,
    orig_h: u32,
}

/// Letterboxes the frame into the model's square input and scales channels to
/// [0,1], NHWC.
fn prepare_input(frame: &RgbFrame) -> Result<(Array4<f32>, Letterbox)> {
    let Some(img) = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()) else {
        return Err(anyhow!("frame byte length does not match its dimensions"));
    };

    let scale = INPUT_SIZE as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round().max(1.0)) as u32;
    let new_h = ((frame.height as f32 * scale).round().max(1.0)) as u32;
    let resized = image::imageops::resize(&img, new_w, new_h, FilterType::CatmullRom);

    let pad_x = ((INPUT_SIZE as i64 - new_w as i64) / 2).max(0) as u32;
    let pad_y = ((INPUT_SIZE as i64 - new_h as i64) / 2).max(0) as u32;

    let mut input = Array4::<f32>::zeros((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (ix, iy) = (x + pad_x, y + pad_y);
        if ix >= INPUT_SIZE || iy >= INPUT_SIZE {
            continue;
        }
        for channel in 0..3 {
            input[[0, iy as usize, ix as usize, channel]] = pixel.0[channel] as f32 / 255.0;
        }
    }

    Ok((
        input,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_w: frame.width,
            orig_h: frame.height,
        },
    ))
}

/// Decodes the model's flat [x, y, z; 21] block into image-normalized
/// landmarks.
fn decode_landmarks(flat: &[f32], letterbox: &Letterbox) -> Result<HandLandmarks> {
    let points: Vec<Landmark> = flat
        .chunks_exact(3)
        .take(LANDMARK_COUNT)
        .map(|chunk| {
            // Model coordinates are pixels in the letterboxed input; undo the
            // letterbox, then normalize against the source image.
            let px = (chunk[0] - letterbox.pad_x) / letterbox.scale;
            let py = (chunk[1] - letterbox.pad_y) / letterbox.scale;
            Landmark::new(
                (px / letterbox.orig_w as f32).clamp(0.0, 1.0),
                (py / letterbox.orig_h as f32).clamp(0.0, 1.0),
                chunk[2] / (INPUT_SIZE as f32),
            )
        })
        .collect();

    HandLandmarks::from_slice(&points)
        .map_err(|err| anyhow!("bad landmark tensor ({} floats): {err}", flat.len()))
}
