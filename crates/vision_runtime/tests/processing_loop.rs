use crossbeam_channel::{bounded, Receiver};
use image::{Rgb, RgbImage};
use inference::{DetectionError, PoseEngine, PoseLandmarkDetector, COCO_KEYPOINTS};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vision_core::interfaces::{Frame, FrameRecord, Recorder};
use vision_core::source::VecFrameSource;
use vision_runtime::prelude::*;
use vision_runtime::{process_source_with, LoopStatus, SessionEvent};

const ORANGE: Rgb<u8> = Rgb([230, 132, 34]);
const GREEN: Rgb<u8> = Rgb([54, 179, 54]);

fn stick_frame(id: u64) -> Frame {
    let mut img = RgbImage::new(64, 64);
    for y in 4..12 {
        for x in 4..12 {
            img.put_pixel(x, y, ORANGE);
        }
    }
    for y in 40..48 {
        for x in 48..56 {
            img.put_pixel(x, y, GREEN);
        }
    }
    Frame::from_rgb(id, id as f64 / 30.0, &img)
}

struct StandingPose;

impl PoseEngine for StandingPose {
    fn name(&self) -> &str {
        "standing"
    }
    fn load(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }
    fn infer(&mut self, _image: &RgbImage) -> Result<Vec<[f32; 3]>, DetectionError> {
        Ok(vec![[0.5, 0.5, 0.8]; COCO_KEYPOINTS.len()])
    }
}

struct FailingPose;

impl PoseEngine for FailingPose {
    fn name(&self) -> &str {
        "failing"
    }
    fn load(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }
    fn infer(&mut self, _image: &RgbImage) -> Result<Vec<[f32; 3]>, DetectionError> {
        Err(DetectionError::Engine("device lost".into()))
    }
}

/// Keeps the ids of recorded frames.
#[derive(Clone, Default)]
struct IdRecorder(Arc<Mutex<Vec<u64>>>);

impl Recorder for IdRecorder {
    fn record(&mut self, record: &FrameRecord) -> std::io::Result<()> {
        self.0.lock().unwrap().push(record.frame_id);
        Ok(())
    }
}

fn next_tracked(session: &TrackingSession) -> u64 {
    match session.events().recv_timeout(Duration::from_secs(5)) {
        Ok(SessionEvent::Tracked(t)) => t.frame_id,
        other => panic!("unexpected event {other:?}"),
    }
}

/// Blocks each inference until the test releases it.
struct GatedPose(Receiver<()>);

impl PoseEngine for GatedPose {
    fn name(&self) -> &str {
        "gated"
    }
    fn load(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }
    fn infer(&mut self, _image: &RgbImage) -> Result<Vec<[f32; 3]>, DetectionError> {
        let _ = self.0.recv();
        Ok(vec![[0.5, 0.5, 0.8]; COCO_KEYPOINTS.len()])
    }
}

#[test]
fn tick_assembles_tracking_frame_with_midpoint_between_blobs() {
    let mut pipeline = FrameProcessingLoop::new(LoopConfig::default()).with_pose(PoseLandmarkDetector::new(Box::new(StandingPose)));
    pipeline.start_tracking().unwrap();

    let TickOutcome::Processed(output) = pipeline.try_tick(&stick_frame(7)) else {
        panic!("tick was not processed");
    };
    let t = &output.tracking;
    assert_eq!(t.frame_id, 7);
    assert_eq!(t.pose_keypoints.len(), 17);
    let [Some(a), Some(b)] = t.stick_endpoints else {
        panic!("both endpoints expected");
    };
    assert!((a.x - 0.125).abs() < 1e-3 && (a.y - 0.125).abs() < 1e-3);
    assert!((b.x - 0.8125).abs() < 1e-3 && (b.y - 0.6875).abs() < 1e-3);
    let (mx, my) = t.midpoint.unwrap();
    assert!(mx > a.x && mx < b.x && my > a.y && my < b.y);
    let overlay = output.overlay.as_ref().unwrap();
    assert_eq!(overlay.dimensions(), (64, 64));
}

#[test]
fn ticks_are_skipped_when_not_tracking_and_dropped_while_in_flight() {
    let mut pipeline = FrameProcessingLoop::new(LoopConfig::default());
    assert!(matches!(pipeline.try_tick(&stick_frame(0)), TickOutcome::Skipped));

    pipeline.start_tracking().unwrap();
    let permit = pipeline.gate().try_enter().unwrap();
    assert!(matches!(pipeline.try_tick(&stick_frame(1)), TickOutcome::Dropped));
    assert_eq!(pipeline.dropped_ticks(), 1);
    drop(permit);
    assert!(matches!(pipeline.try_tick(&stick_frame(2)), TickOutcome::Processed(_)));
}

#[test]
fn detection_failure_halts_the_loop_with_a_status_message() {
    let mut pipeline = FrameProcessingLoop::new(LoopConfig::default()).with_pose(PoseLandmarkDetector::new(Box::new(FailingPose)));
    let mut source = VecFrameSource::new((0..5).map(stick_frame).collect());
    let report = process_source(&mut source, &mut pipeline).unwrap();

    assert_eq!(report.frames, 1);
    assert_eq!(report.processed, 0);
    let message = report.halted.unwrap();
    assert!(message.contains("device lost"), "{message}");
    assert!(!pipeline.is_tracking());
}

#[test]
fn halted_status_is_sticky_until_restart() {
    let mut pipeline = FrameProcessingLoop::new(LoopConfig::default()).with_pose(PoseLandmarkDetector::new(Box::new(FailingPose)));
    pipeline.start_tracking().unwrap();
    assert!(matches!(pipeline.try_tick(&stick_frame(0)), TickOutcome::Halted(_)));
    assert!(matches!(pipeline.status(), LoopStatus::Halted(_)));
    assert!(matches!(pipeline.try_tick(&stick_frame(1)), TickOutcome::Halted(_)));
}

#[test]
fn offline_processing_records_annotated_frames() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("run");
    let mut pipeline = FrameProcessingLoop::new(LoopConfig {
        overlay: None,
        ..LoopConfig::default()
    });
    pipeline.start_recording(Box::new(PngSequenceRecorder::create(&out)?));

    let mut source = VecFrameSource::new((0..3).map(stick_frame).collect());
    let mut seen = Vec::new();
    let report = process_source_with(&mut source, &mut pipeline, |t| seen.push(t.frame_id))?;
    assert_eq!((report.frames, report.processed, report.recorded), (3, 3, 3));
    assert_eq!(report.with_both_endpoints, 3);
    assert_eq!(seen, vec![0, 1, 2]);
    assert!(report.halted.is_none());
    assert!(!pipeline.is_recording());

    for id in 0..3 {
        let png = image::open(out.join(format!("frame_{id:06}.png")))?;
        assert_eq!((png.width(), png.height()), (64, 64));
    }
    let lines = fs::read_to_string(out.join("tracks.jsonl"))?;
    assert_eq!(lines.lines().count(), 3);
    let first: data_contracts::TrackingFrame = serde_json::from_str(lines.lines().next().unwrap())?;
    assert!(first.midpoint.is_some());
    Ok(())
}

#[test]
fn session_drops_frames_offered_while_busy() -> anyhow::Result<()> {
    let (release_tx, release_rx) = bounded(0);
    let pipeline = FrameProcessingLoop::new(LoopConfig::default()).with_pose(PoseLandmarkDetector::new(Box::new(GatedPose(release_rx))));
    let session = TrackingSession::start(pipeline)?;

    assert!(session.offer(stick_frame(0)));
    assert!(session.is_busy());
    assert!(!session.offer(stick_frame(1)));
    assert!(!session.offer(stick_frame(2)));
    release_tx.send(())?;

    match session.events().recv()? {
        SessionEvent::Tracked(t) => assert_eq!(t.frame_id, 0),
        other => panic!("unexpected event {other:?}"),
    }
    drop(release_tx);
    let summary = session.stop()?;
    assert_eq!(summary.offered, 3);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.dropped, 2);
    assert!(summary.halted.is_none());
    Ok(())
}

#[test]
fn stop_returns_when_events_were_never_read() -> anyhow::Result<()> {
    let session = TrackingSession::start(FrameProcessingLoop::new(LoopConfig {
        overlay: None,
        ..LoopConfig::default()
    }))?;
    // Well past the event queue capacity.
    for id in 0..100 {
        while session.is_busy() {
            std::thread::yield_now();
        }
        assert!(session.offer(stick_frame(id)), "frame {id} was dropped");
    }

    let (done_tx, done_rx) = bounded(1);
    std::thread::spawn(move || {
        let _ = done_tx.send(session.stop());
    });
    let summary = done_rx.recv_timeout(Duration::from_secs(5))??;
    assert_eq!(summary.processed, 100);
    assert_eq!(summary.dropped, 0);
    Ok(())
}

#[test]
fn session_records_only_between_start_and_stop() -> anyhow::Result<()> {
    let session = TrackingSession::start(FrameProcessingLoop::new(LoopConfig {
        overlay: None,
        ..LoopConfig::default()
    }))?;
    let recorder = IdRecorder::default();

    assert!(session.offer(stick_frame(0)));
    assert_eq!(next_tracked(&session), 0);

    session.start_recording(Box::new(recorder.clone()))?;
    for id in 1..3 {
        assert!(session.offer(stick_frame(id)));
        assert_eq!(next_tracked(&session), id);
    }
    assert_eq!(session.stop_recording()?, 2);

    assert!(session.offer(stick_frame(3)));
    assert_eq!(next_tracked(&session), 3);

    let summary = session.stop()?;
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.recorded, 2);
    assert_eq!(*recorder.0.lock().unwrap(), vec![1, 2]);
    Ok(())
}
