use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use crate::{engine::InitError, types::RgbFrame};

pub const SIGN_INPUT_SIZE: u32 = 150;

#[derive(Clone, Debug, PartialEq)]
pub struct SignPrediction {
    pub label: String,
    pub confidence: f32,
}

/// The still-image sign classifier boundary; a small image-in, label-out
/// model behind an opaque runtime.
pub trait SignEngine: Send + 'static {
    fn predict(&mut self, image: &RgbFrame) -> Result<SignPrediction>;
}

/// ONNX Runtime binding for the sign classifier: 150x150 RGB in, one score
/// per class out, highest score wins.
pub struct OrtSignEngine {
    session: Session,
    class_names: Vec<String>,
}

impl OrtSignEngine {
    pub fn load(model_path: &Path, class_names: Vec<String>) -> Result<Self, InitError> {
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|source| InitError {
                path: model_path.to_path_buf(),
                source,
            })?;

        log::info!("sign classifier ready from {}", model_path.display());
        Ok(OrtSignEngine {
            session,
            class_names,
        })
    }
}

impl SignEngine for OrtSignEngine {
    fn predict(&mut self, image: &RgbFrame) -> Result<SignPrediction> {
        let input = prepare_input(image)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run sign classifier session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("classifier returned no outputs"));
        }

        let scores = outputs[0].try_extract_array::<f32>()?;
        let flat: Vec<f32> = scores.iter().copied().collect();
        let (best, confidence) = argmax(&flat).ok_or_else(|| anyhow!("empty score vector"))?;

        let label = self
            .class_names
            .get(best)
            .cloned()
            .unwrap_or_else(|| format!("class_{best}"));

        Ok(SignPrediction { label, confidence })
    }
}

/// Squashes the frame to the classifier's fixed input size and scales
/// channels to [0,1], NHWC.
pub fn prepare_input(frame: &RgbFrame) -> Result<Array4<f32>> {
    let Some(img) = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()) else {
        return Err(anyhow!("frame byte length does not match its dimensions"));
    };

    let resized = image::imageops::resize(
        &img,
        SIGN_INPUT_SIZE,
        SIGN_INPUT_SIZE,
        FilterType::Triangle,
    );

    let size = SIGN_INPUT_SIZE as usize;
    let mut input = Array4::<f32>::zeros((1, size, size, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            input[[0, y as usize, x as usize, channel]] = pixel.0[channel] as f32 / 255.0;
        }
    }

    Ok(input)
}

fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}
