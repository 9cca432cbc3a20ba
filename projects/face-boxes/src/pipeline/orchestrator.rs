// Capture loop orchestrator: owns the session lifecycle
//
// Wires the camera, the detection pool, and the display window together and
// drives the frame-synchronous capture → detect → annotate → display loop
// until the quit key is observed.

use crate::display::window::HighguiDisplay;
use crate::display::FrameDisplay;
use crate::pipeline::annotate::{draw_boxes, BoxStyle};
use crate::pipeline::detection::{to_grayscale, FrameDetector};
use crate::pipeline::detection_worker::DetectorPool;
use crate::pipeline::types::LoopStats;
use crate::run_artifacts::{DetectionLog, SessionInfo};
use crate::run_context::RunContext;
use crate::video::camera::CameraSource;
use crate::video::FrameSource;
use anyhow::Result;
use std::time::Instant;

/// Frames between periodic progress log lines.
const PROGRESS_LOG_INTERVAL: u64 = 120;

/// Opens every device described by the context, runs the capture loop, and
/// tears everything down again. The camera, pool, and window live exactly as
/// long as this call.
pub fn run(ctx: &RunContext) -> Result<()> {
    let mut source = CameraSource::open(&ctx.camera)?;
    let mut detector = DetectorPool::spawn(&ctx.classifiers, ctx.params, ctx.worker_count)?;
    let mut display = HighguiDisplay::create(&ctx.window_title)?;
    let mut log = ctx
        .detections_out
        .as_ref()
        .map(|_| DetectionLog::new(SessionInfo::from_context(ctx)));

    let stats = run_loop(
        &mut source,
        &mut detector,
        &mut display,
        &ctx.style,
        ctx.quit_key,
        log.as_mut(),
    )?;

    tracing::info!(
        "Capture loop finished: {} frames, {:.1} fps effective",
        stats.frames,
        stats.effective_fps()
    );

    if let (Some(log), Some(path)) = (log, ctx.detections_out.as_ref()) {
        log.write(path)?;
        tracing::info!("Wrote detection log to {:?}", path);
    }

    Ok(())
}

/// One pass per frame: capture, grayscale, detect, annotate, display, poll.
///
/// The loop is frame-synchronous: every classifier result is gathered and
/// drawn before the next frame is captured. It terminates on the first
/// iteration whose polled key equals `quit_key`.
pub fn run_loop(
    source: &mut dyn FrameSource,
    detector: &mut dyn FrameDetector,
    display: &mut dyn FrameDisplay,
    style: &BoxStyle,
    quit_key: char,
    mut log: Option<&mut DetectionLog>,
) -> Result<LoopStats> {
    let mut stats = LoopStats::new();

    loop {
        let frame_start = Instant::now();
        let mut frame = source.next_frame()?;

        let gray = to_grayscale(&frame)?;

        let detect_start = Instant::now();
        let detections = detector.detect_all(&gray)?;
        let detect_ms = detect_start.elapsed().as_secs_f64() * 1000.0;

        let total: usize = detections.iter().map(Vec::len).sum();
        tracing::debug!(
            "frame {}: {} face(s) {:?}",
            stats.frames,
            total,
            detections
        );
        if let Some(log) = log.as_deref_mut() {
            log.record(stats.frames, &detections);
        }

        for faces in &detections {
            draw_boxes(&mut frame, faces, style)?;
        }

        display.show(&frame)?;
        let key = display.poll_key()?;

        stats.update(detect_ms, frame_start.elapsed().as_secs_f64() * 1000.0);
        if stats.frames % PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!(
                "{} frames, {:.1} fps, detect {:.1} ms/frame",
                stats.frames,
                stats.fps(),
                stats.detect_ms
            );
        }

        if key == Some(quit_key) {
            tracing::info!("Quit key pressed, stopping capture loop");
            break;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use opencv::core::{Mat, Rect, Scalar, CV_8UC3};
    use opencv::prelude::*;

    struct FakeSource {
        produced: usize,
    }

    impl FrameSource for FakeSource {
        fn next_frame(&mut self) -> Result<Mat> {
            self.produced += 1;
            // A fresh black BGR frame every call, like a re-armed capture buffer
            Ok(Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(0.0))?)
        }
    }

    /// Returns scripted per-frame results; empty lists once the script runs out.
    struct FakeDetector {
        script: Vec<Vec<Vec<Rect>>>,
        calls: usize,
        saw_color_input: bool,
    }

    impl FakeDetector {
        fn new(script: Vec<Vec<Vec<Rect>>>) -> Self {
            Self {
                script,
                calls: 0,
                saw_color_input: false,
            }
        }
    }

    impl FrameDetector for FakeDetector {
        fn detect_all(&mut self, gray: &Mat) -> Result<Vec<Vec<Rect>>> {
            if gray.channels() != 1 {
                self.saw_color_input = true;
            }
            let result = self
                .script
                .get(self.calls)
                .cloned()
                .unwrap_or_else(|| vec![vec![]]);
            self.calls += 1;
            Ok(result)
        }
    }

    /// Records every shown frame and plays back a scripted key sequence.
    struct FakeDisplay {
        shown: Vec<Mat>,
        keys: Vec<Option<char>>,
        polls: usize,
    }

    impl FakeDisplay {
        fn new(keys: Vec<Option<char>>) -> Self {
            Self {
                shown: Vec::new(),
                keys,
                polls: 0,
            }
        }
    }

    impl FrameDisplay for FakeDisplay {
        fn show(&mut self, frame: &Mat) -> Result<()> {
            self.shown.push(frame.clone());
            Ok(())
        }

        fn poll_key(&mut self) -> Result<Option<char>> {
            let key = self
                .keys
                .get(self.polls)
                .copied()
                .ok_or_else(|| anyhow!("loop out-ran the scripted key sequence"))?;
            self.polls += 1;
            Ok(key)
        }
    }

    fn style() -> BoxStyle {
        BoxStyle::new([0, 255, 0], 1)
    }

    fn pixel(frame: &Mat, row: i32, col: i32) -> [u8; 3] {
        let bytes = frame.data_bytes().unwrap();
        let idx = ((row * 320 + col) * 3) as usize;
        [bytes[idx], bytes[idx + 1], bytes[idx + 2]]
    }

    #[test]
    fn test_loop_stops_on_first_quit_key_and_not_before() {
        let mut source = FakeSource { produced: 0 };
        let mut detector = FakeDetector::new(vec![]);
        // 'x' must not stop the loop; only 'q' does
        let mut display = FakeDisplay::new(vec![None, Some('x'), Some('q')]);

        let stats = run_loop(
            &mut source,
            &mut detector,
            &mut display,
            &style(),
            'q',
            None,
        )
        .unwrap();

        assert_eq!(stats.frames, 3);
        assert_eq!(source.produced, 3);
        assert_eq!(display.shown.len(), 3);
    }

    #[test]
    fn test_detector_receives_grayscale_projection() {
        let mut source = FakeSource { produced: 0 };
        let mut detector = FakeDetector::new(vec![]);
        let mut display = FakeDisplay::new(vec![Some('q')]);

        run_loop(
            &mut source,
            &mut detector,
            &mut display,
            &style(),
            'q',
            None,
        )
        .unwrap();

        assert_eq!(detector.calls, 1);
        assert!(!detector.saw_color_input);
    }

    #[test]
    fn test_annotations_do_not_ghost_into_the_next_frame() {
        let mut source = FakeSource { produced: 0 };
        // One face on the first frame, nothing afterwards
        let mut detector =
            FakeDetector::new(vec![vec![vec![Rect::new(50, 40, 60, 30)]], vec![vec![]]]);
        let mut display = FakeDisplay::new(vec![None, Some('q')]);

        run_loop(
            &mut source,
            &mut detector,
            &mut display,
            &style(),
            'q',
            None,
        )
        .unwrap();

        assert_eq!(display.shown.len(), 2);
        // The first shown frame carries the outline
        assert_eq!(pixel(&display.shown[0], 40, 50), [0, 255, 0]);
        // The second shown frame is clean
        assert!(display.shown[1]
            .data_bytes()
            .unwrap()
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_results_from_every_classifier_are_drawn_cumulatively() {
        let mut source = FakeSource { produced: 0 };
        // Two classifiers hit different regions of the same frame
        let mut detector = FakeDetector::new(vec![vec![
            vec![Rect::new(10, 10, 20, 20)],
            vec![Rect::new(200, 100, 40, 40)],
        ]]);
        let mut display = FakeDisplay::new(vec![Some('q')]);

        run_loop(
            &mut source,
            &mut detector,
            &mut display,
            &style(),
            'q',
            None,
        )
        .unwrap();

        let frame = &display.shown[0];
        assert_eq!(pixel(frame, 10, 10), [0, 255, 0]);
        assert_eq!(pixel(frame, 100, 200), [0, 255, 0]);
    }

    #[test]
    fn test_detection_log_records_every_frame_in_order() {
        let mut source = FakeSource { produced: 0 };
        let mut detector = FakeDetector::new(vec![
            vec![vec![Rect::new(1, 2, 3, 4)], vec![]],
            vec![vec![], vec![]],
        ]);
        let mut display = FakeDisplay::new(vec![None, Some('q')]);

        let session = SessionInfo {
            started_at: chrono::Utc::now(),
            camera_index: 0,
            width: 320,
            height: 240,
            fps: 32,
            classifiers: vec!["frontal".to_string(), "profile".to_string()],
        };
        let mut log = DetectionLog::new(session);

        run_loop(
            &mut source,
            &mut detector,
            &mut display,
            &style(),
            'q',
            Some(&mut log),
        )
        .unwrap();

        assert_eq!(log.frames.len(), 2);
        assert_eq!(log.frames[0].frame, 0);
        assert_eq!(log.frames[1].frame, 1);
        assert_eq!(log.frames[0].faces[0].len(), 1);
        assert!(log.frames[1].faces[0].is_empty());
    }
}
