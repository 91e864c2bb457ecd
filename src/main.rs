mod convert;
mod engine;
mod frame;
mod hand;
mod overlay;
mod pipeline;
mod sign;
mod types;

use std::{env, path::PathBuf, thread, time::Duration};

use anyhow::{Result, bail};

use crate::{
    engine::OrtHandEngine,
    frame::{CameraFrame, Plane},
    overlay::CameraFacing,
    pipeline::{DetectorConfig, HandSession, report_channel},
    sign::{OrtSignEngine, SignEngine},
    types::Fidelity,
};

const FEED_WIDTH: u32 = 320;
const FEED_HEIGHT: u32 = 240;
const FEED_FRAMES: u32 = 90;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1).map(PathBuf::from);
    let Some(model_path) = args.next() else {
        bail!("usage: handsense <handpose-model.onnx> [sign-model.onnx]");
    };

    if let Some(sign_model) = args.next() {
        classify_still(&sign_model)?;
    }

    let engine = OrtHandEngine::load(&model_path)?.with_min_confidence(0.5);

    let (reports, report_rx) = report_channel();
    let session = HandSession::start(engine, DetectorConfig::default(), reports);

    let printer = thread::spawn(move || {
        let mut last_hands = Vec::new();
        for report in report_rx.iter() {
            match (&report.error, report.hands.first()) {
                (Some(err), _) => println!("[{:>8}ms] error: {err}", report.timestamp_ms),
                (None, Some(first)) => {
                    let pinch =
                        hand::distance(first[hand::index::THUMB_TIP], first[hand::index::INDEX_TIP]);
                    println!(
                        "[{:>8}ms] hands: {}  extended fingers: {}  pinch: {pinch:.3}",
                        report.timestamp_ms, report.hands_detected, report.extended_fingers
                    );
                }
                (None, None) => println!("[{:>8}ms] no hands", report.timestamp_ms),
            }
            if !report.hands.is_empty() {
                last_hands = report.hands;
            }
        }
        last_hands
    });

    // A synthetic 4:2:0 feed stands in for the camera subsystem; real sources
    // hand over `CameraFrame`s with their own release hooks.
    for seq in 0..FEED_FRAMES {
        session.submit(synthetic_frame(FEED_WIDTH, FEED_HEIGHT, seq));
        thread::sleep(Duration::from_millis(33));
    }

    session.close();

    let last_hands = printer.join().unwrap_or_default();
    if !last_hands.is_empty() {
        save_overlay_snapshot(&last_hands)?;
    }
    Ok(())
}

/// Runs the still-image sign classifier once over a full-fidelity conversion.
fn classify_still(sign_model: &PathBuf) -> Result<()> {
    let class_names = vec![
        "sign_one".to_string(),
        "sign_two".to_string(),
        "sign_three".to_string(),
    ];
    let mut classifier = OrtSignEngine::load(sign_model, class_names)?;

    let still = convert::convert_frame(&synthetic_frame(FEED_WIDTH, FEED_HEIGHT, 0), Fidelity::Still)?;
    let prediction = classifier.predict(&still)?;
    println!(
        "still sign: {} ({:.0}%)",
        prediction.label,
        prediction.confidence * 100.0
    );
    Ok(())
}

fn save_overlay_snapshot(hands: &[hand::HandLandmarks]) -> Result<()> {
    let mut canvas = vec![0u8; (FEED_WIDTH * FEED_HEIGHT * 4) as usize];
    overlay::draw_landmarks(&mut canvas, FEED_WIDTH, FEED_HEIGHT, hands, CameraFacing::Front);
    let Some(img) = image::RgbaImage::from_raw(FEED_WIDTH, FEED_HEIGHT, canvas) else {
        bail!("overlay canvas size mismatch");
    };
    img.save("landmarks.png")?;
    log::info!("wrote landmark overlay to landmarks.png");
    Ok(())
}

fn synthetic_frame(width: u32, height: u32, seq: u32) -> CameraFrame {
    let w = width as usize;
    let h = height as usize;

    let mut luma = vec![0u8; w * h];
    for (y, row) in luma.chunks_exact_mut(w).enumerate() {
        for (x, px) in row.iter_mut().enumerate() {
            *px = ((x + y + seq as usize * 4) % 256) as u8;
        }
    }
    let chroma = vec![128u8; w * h / 4];

    CameraFrame::new(
        width,
        height,
        vec![
            Plane::packed(luma, w),
            Plane::packed(chroma.clone(), w / 2),
            Plane::packed(chroma, w / 2),
        ],
    )
}
