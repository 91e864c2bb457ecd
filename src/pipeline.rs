use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{
    convert,
    engine::LandmarkEngine,
    frame::CameraFrame,
    hand,
    types::{Detection, Fidelity, HandReport},
};

#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    pub max_hands: usize,
    pub fidelity: Fidelity,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            max_hands: 2,
            fidelity: Fidelity::Preview,
        }
    }
}

/// Channel the pipeline publishes reports on. Capacity one: a slow consumer
/// sees the latest report, never a backlog.
pub fn report_channel() -> (ReportSink, Receiver<HandReport>) {
    let (tx, rx) = bounded(1);
    (
        ReportSink {
            tx,
            stale_rx: rx.clone(),
        },
        rx,
    )
}

/// Producer side of the report channel, with newest-wins delivery: an unread
/// report is displaced rather than queued behind.
pub struct ReportSink {
    tx: Sender<HandReport>,
    stale_rx: Receiver<HandReport>,
}

impl ReportSink {
    fn publish(&self, report: HandReport) {
        if let Err(TrySendError::Full(report)) = self.tx.try_send(report) {
            let _ = self.stale_rx.try_recv();
            let _ = self.tx.try_send(report);
        }
    }
}

/// One live detection session: a dedicated worker that converts frames,
/// runs the landmark engine, and publishes reports.
///
/// At most one frame is ever pending: `submit` displaces a stale undelivered
/// frame instead of queueing behind it. Dropping or closing the session stops
/// the worker and releases anything still pending.
pub struct HandSession {
    frame_tx: Option<Sender<CameraFrame>>,
    stale_rx: Receiver<CameraFrame>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl HandSession {
    pub fn start<E: LandmarkEngine>(
        engine: E,
        config: DetectorConfig,
        reports: ReportSink,
    ) -> Self {
        let (frame_tx, frame_rx) = bounded::<CameraFrame>(1);
        let stale_rx = frame_rx.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let worker = thread::spawn(move || {
            run_worker(engine, config, frame_rx, reports, stop_flag);
        });

        HandSession {
            frame_tx: Some(frame_tx),
            stale_rx,
            stop,
            worker: Some(worker),
        }
    }

    /// Hands a frame to the worker, newest-wins. If an undelivered frame is
    /// still pending, it is displaced and released; the new frame takes its
    /// slot.
    pub fn submit(&self, frame: CameraFrame) {
        let Some(frame_tx) = &self.frame_tx else {
            return;
        };
        if let Err(TrySendError::Full(frame)) = frame_tx.try_send(frame) {
            // Dropping the displaced frame releases it.
            let _ = self.stale_rx.try_recv();
            let _ = frame_tx.try_send(frame);
        }
    }

    /// Tears the session down: any pending frame is released unprocessed, the
    /// worker is joined, and the engine handle drops with it. Consuming the
    /// session means later submissions cannot be expressed at all.
    pub fn close(self) {}
}

impl Drop for HandSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Disconnect the worker's recv; it exits once the channel drains.
        drop(self.frame_tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker<E: LandmarkEngine>(
    mut engine: E,
    config: DetectorConfig,
    frame_rx: Receiver<CameraFrame>,
    reports: ReportSink,
    stop: Arc<AtomicBool>,
) {
    let epoch = Instant::now();

    while let Ok(frame) = frame_rx.recv() {
        if stop.load(Ordering::Relaxed) {
            // Teardown already began; release and bail without detecting.
            drop(frame);
            break;
        }

        let frame = latest_frame(&frame_rx, frame);
        let timestamp_ms = epoch.elapsed().as_millis() as i64;
        let report = process_frame(&mut engine, config, frame, timestamp_ms);
        reports.publish(report);
    }
}

fn latest_frame(frame_rx: &Receiver<CameraFrame>, mut frame: CameraFrame) -> CameraFrame {
    // Skip ahead to the newest pending frame; the ones passed over are
    // released as they drop.
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    frame
}

fn process_frame<E: LandmarkEngine>(
    engine: &mut E,
    config: DetectorConfig,
    frame: CameraFrame,
    timestamp_ms: i64,
) -> HandReport {
    let rgb = match convert::convert_frame(&frame, config.fidelity) {
        Ok(rgb) => rgb,
        Err(err) => {
            log::warn!("dropping malformed frame: {err}");
            return HandReport {
                error: Some(err.to_string()),
                timestamp_ms,
                ..HandReport::default()
            };
        }
    };
    // The engine works on the RGB copy; the source frame goes back to the
    // camera before inference starts.
    drop(frame);

    match engine.detect(&rgb, timestamp_ms) {
        Ok(mut detection) => {
            detection.hands.truncate(config.max_hands);
            build_report(detection, timestamp_ms)
        }
        Err(err) => {
            log::warn!("detection failed: {err:?}");
            HandReport {
                error: Some(err.to_string()),
                timestamp_ms,
                ..HandReport::default()
            }
        }
    }
}

fn build_report(detection: Detection, timestamp_ms: i64) -> HandReport {
    let extended_fingers = detection
        .hands
        .first()
        .map(hand::count_extended_fingers)
        .unwrap_or(0);

    HandReport {
        hands_detected: detection.hands.len(),
        extended_fingers,
        hands: detection.hands,
        error: None,
        timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use anyhow::Result;
    use crossbeam_channel::RecvTimeoutError;

    use super::*;
    use crate::{
        frame::Plane,
        hand::{HandLandmarks, LANDMARK_COUNT, Landmark, index},
        types::RgbFrame,
    };

    const W: u32 = 16;
    const H: u32 = 16;

    fn test_frame(released: &Arc<AtomicUsize>) -> CameraFrame {
        let counter = released.clone();
        let area = (W * H) as usize;
        CameraFrame::new(
            W,
            H,
            vec![
                Plane::packed(vec![128; area], W as usize),
                Plane::packed(vec![128; area / 4], W as usize / 2),
                Plane::packed(vec![128; area / 4], W as usize / 2),
            ],
        )
        .with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn truncated_frame(released: &Arc<AtomicUsize>) -> CameraFrame {
        let counter = released.clone();
        CameraFrame::new(
            W,
            H,
            vec![
                Plane::packed(vec![128; 4], W as usize),
                Plane::packed(vec![128; 4], W as usize / 2),
                Plane::packed(vec![128; 4], W as usize / 2),
            ],
        )
        .with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Fixed two-extended-finger hand: thumb and index fire, the rest tie.
    fn scripted_hand() -> HandLandmarks {
        let mut points = [Landmark::default(); LANDMARK_COUNT];
        points[index::THUMB_TIP] = Landmark::new(0.7, 0.5, 0.0);
        points[index::THUMB_IP] = Landmark::new(0.5, 0.5, 0.0);
        points[index::INDEX_TIP] = Landmark::new(0.4, 0.2, 0.0);
        points[index::INDEX_PIP] = Landmark::new(0.4, 0.4, 0.0);
        HandLandmarks::new(points)
    }

    struct ScriptedEngine {
        hands: usize,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedEngine {
        fn new(hands: usize, delay: Duration) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                ScriptedEngine {
                    hands,
                    delay,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl LandmarkEngine for ScriptedEngine {
        fn detect(&mut self, image: &RgbFrame, _timestamp_ms: i64) -> Result<Detection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            Ok(Detection {
                hands: vec![scripted_hand(); self.hands],
                image_width: image.width,
                image_height: image.height,
            })
        }
    }

    #[test]
    fn reports_hands_and_finger_count_of_first_hand() {
        let (engine, _calls) = ScriptedEngine::new(2, Duration::ZERO);
        let (report_tx, report_rx) = report_channel();
        let session = HandSession::start(engine, DetectorConfig::default(), report_tx);

        let released = Arc::new(AtomicUsize::new(0));
        session.submit(test_frame(&released));

        let report = report_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("report should arrive");
        assert_eq!(report.hands_detected, 2);
        assert_eq!(report.extended_fingers, 2);
        assert!(report.error.is_none());

        session.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn max_hands_caps_the_report() {
        let (engine, _calls) = ScriptedEngine::new(5, Duration::ZERO);
        let (report_tx, report_rx) = report_channel();
        let config = DetectorConfig {
            max_hands: 2,
            ..DetectorConfig::default()
        };
        let session = HandSession::start(engine, config, report_tx);

        let released = Arc::new(AtomicUsize::new(0));
        session.submit(test_frame(&released));
        let report = report_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.hands_detected, 2);
        session.close();
    }

    #[test]
    fn malformed_frame_reports_error_and_keeps_running() {
        let (engine, calls) = ScriptedEngine::new(1, Duration::ZERO);
        let (report_tx, report_rx) = report_channel();
        let session = HandSession::start(engine, DetectorConfig::default(), report_tx);

        let released = Arc::new(AtomicUsize::new(0));
        session.submit(truncated_frame(&released));
        let report = report_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.hands_detected, 0);
        assert!(report.error.is_some());
        assert_eq!(released.load(Ordering::SeqCst), 1);

        // The stream continues: a good frame after a bad one still detects.
        session.submit(test_frame(&released));
        let report = report_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.hands_detected, 1);
        assert!(report.error.is_none());
        assert!(calls.load(Ordering::SeqCst) >= 1);

        session.close();
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sustained_submission_keeps_at_most_one_frame_pending() {
        let (engine, calls) = ScriptedEngine::new(1, Duration::from_millis(20));
        let (report_tx, report_rx) = report_channel();
        let session = HandSession::start(engine, DetectorConfig::default(), report_tx);

        let released = Arc::new(AtomicUsize::new(0));
        const SUBMITTED: usize = 50;
        for _ in 0..SUBMITTED {
            session.submit(test_frame(&released));
            if let Some(frame_tx) = &session.frame_tx {
                assert!(frame_tx.len() <= 1, "pending frames must not accumulate");
            }
        }
        // The consumer never reads; reports must not pile up either.
        assert!(report_rx.len() <= 1);

        session.close();

        // Every frame came back exactly once: processed, displaced, or
        // released at teardown.
        assert_eq!(released.load(Ordering::SeqCst), SUBMITTED);
        // Frames were dropped under load rather than queued.
        assert!(calls.load(Ordering::SeqCst) < SUBMITTED);
    }

    #[test]
    fn close_releases_pending_frames_and_joins_worker() {
        let (engine, _calls) = ScriptedEngine::new(1, Duration::from_millis(50));
        let (report_tx, report_rx) = report_channel();
        let session = HandSession::start(engine, DetectorConfig::default(), report_tx);

        let released = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            session.submit(test_frame(&released));
        }
        session.close();

        assert_eq!(released.load(Ordering::SeqCst), 5);
        // Worker is gone; the report channel disconnects once drained.
        loop {
            match report_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => panic!("report channel should disconnect"),
            }
        }
    }
}
