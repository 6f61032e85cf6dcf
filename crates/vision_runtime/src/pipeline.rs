use crate::fps::FrameRateEstimator;
use crate::gate::TickGate;
use crate::{RuntimeError, RuntimeResult};
use data_contracts::{ColorThreshold, TrackingFrame};
use image::RgbaImage;
use inference::{Detector, PoseLandmarkDetector};
use tracing::{debug, error, info, warn};
use vision_core::color::StickDetector;
use vision_core::interfaces::{Frame, FrameRecord, FrameSource, Recorder};
use vision_core::overlay::{render_overlay, OverlayStyle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    pub stick_ends: [ColorThreshold; 2],
    /// Pixel sampling stride for the colour scan.
    pub color_stride: u32,
    pub fps_window: u32,
    /// Render an annotated frame each tick (always done while recording).
    pub overlay: Option<OverlayStyle>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            stick_ends: [ColorThreshold::orange(), ColorThreshold::green()],
            color_stride: 1,
            fps_window: 30,
            overlay: Some(OverlayStyle::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopStatus {
    Idle,
    Tracking,
    /// Stopped by a per-frame failure.
    Halted(String),
}

#[derive(Debug, Clone)]
pub struct TickOutput {
    pub tracking: TrackingFrame,
    pub overlay: Option<RgbaImage>,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Processed(Box<TickOutput>),
    /// A previous tick was still in flight.
    Dropped,
    /// Tracking is not running.
    Skipped,
    Halted(String),
}

pub struct FrameProcessingLoop {
    config: LoopConfig,
    sticks: StickDetector,
    pose: Option<PoseLandmarkDetector>,
    fps: FrameRateEstimator,
    recorder: Option<Box<dyn Recorder>>,
    recorded: u64,
    gate: TickGate,
    status: LoopStatus,
    dropped: u64,
}

impl FrameProcessingLoop {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            sticks: StickDetector::new(config.stick_ends).with_stride(config.color_stride),
            fps: FrameRateEstimator::new(config.fps_window),
            config,
            pose: None,
            recorder: None,
            recorded: 0,
            gate: TickGate::new(),
            status: LoopStatus::Idle,
            dropped: 0,
        }
    }

    pub fn with_pose(mut self, pose: PoseLandmarkDetector) -> Self {
        self.pose = Some(pose);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn status(&self) -> &LoopStatus {
        &self.status
    }

    pub fn is_tracking(&self) -> bool {
        self.status == LoopStatus::Tracking
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped
    }

    pub fn gate(&self) -> TickGate {
        self.gate.clone()
    }

    /// Initialise the pose detector (if any) and begin accepting ticks.
    pub fn start_tracking(&mut self) -> RuntimeResult<()> {
        if let Some(pose) = self.pose.as_mut() {
            if !pose.is_initialized() {
                pose.init()?;
            }
        }
        self.fps.reset();
        self.status = LoopStatus::Tracking;
        info!(pose = self.pose.is_some(), "tracking started");
        Ok(())
    }

    pub fn stop_tracking(&mut self) {
        if self.is_tracking() {
            info!(dropped = self.dropped, "tracking stopped");
        }
        self.status = LoopStatus::Idle;
    }

    pub fn start_recording(&mut self, recorder: Box<dyn Recorder>) {
        if self.recorder.is_some() {
            warn!("replacing active recorder");
        }
        self.recorder = Some(recorder);
        self.recorded = 0;
        info!("recording started");
    }

    /// Stop recording; returns the number of frames written.
    pub fn stop_recording(&mut self) -> std::io::Result<u64> {
        let Some(mut recorder) = self.recorder.take() else {
            return Ok(0);
        };
        recorder.finish()?;
        info!(frames = self.recorded, "recording stopped");
        Ok(self.recorded)
    }

    /// Run one tick unless one is already in flight through [`Self::gate`].
    pub fn try_tick(&mut self, frame: &Frame) -> TickOutcome {
        let Some(_permit) = self.gate.try_enter() else {
            self.dropped += 1;
            debug!(frame = frame.id, "tick dropped, previous frame still in flight");
            return TickOutcome::Dropped;
        };
        self.process(frame)
    }

    /// The per-frame path. Callers hold the gate.
    pub(crate) fn process(&mut self, frame: &Frame) -> TickOutcome {
        match &self.status {
            LoopStatus::Tracking => {}
            LoopStatus::Halted(message) => return TickOutcome::Halted(message.clone()),
            LoopStatus::Idle => return TickOutcome::Skipped,
        }
        match self.run_detectors(frame) {
            Ok(output) => TickOutcome::Processed(Box::new(output)),
            Err(err) => {
                let message = format!("frame {}: {err}", frame.id);
                error!(frame = frame.id, error = %err, "per-frame detection failed; stopping tracking");
                self.status = LoopStatus::Halted(message.clone());
                TickOutcome::Halted(message)
            }
        }
    }

    fn run_detectors(&mut self, frame: &Frame) -> RuntimeResult<TickOutput> {
        let pose_keypoints = match self.pose.as_mut() {
            Some(pose) => pose.detect_keypoints(frame)?,
            None => Vec::new(),
        };
        let (stick_endpoints, midpoint) = self.sticks.detect(frame);
        let tracking = TrackingFrame {
            frame_id: frame.id,
            timestamp: frame.timestamp,
            pose_keypoints,
            stick_endpoints,
            midpoint,
            frame_rate: self.fps.tick(),
        };

        let style = self.config.overlay.or_else(|| self.recorder.as_ref().map(|_| OverlayStyle::default()));
        let overlay = style.map(|style| render_overlay(frame, &tracking, &style));
        if let (Some(recorder), Some(image)) = (self.recorder.as_mut(), overlay.as_ref()) {
            recorder
                .record(&FrameRecord {
                    frame_id: frame.id,
                    timestamp: frame.timestamp,
                    image,
                    tracking: &tracking,
                })
                .map_err(|source| RuntimeError::Recorder {
                    context: format!("frame {}", frame.id),
                    source,
                })?;
            self.recorded += 1;
        }
        Ok(TickOutput { tracking, overlay })
    }
}

/// Totals from driving a loop over a whole source.
#[derive(Debug, Clone, Default)]
pub struct ProcessingReport {
    pub frames: u64,
    pub processed: u64,
    pub with_both_endpoints: u64,
    pub with_pose: u64,
    pub recorded: u64,
    /// Set when a per-frame failure stopped processing early.
    pub halted: Option<String>,
}

/// Drive the per-frame path over `source` until end of stream.
pub fn process_source(source: &mut dyn FrameSource, pipeline: &mut FrameProcessingLoop) -> RuntimeResult<ProcessingReport> {
    process_source_with(source, pipeline, |_| {})
}

/// Like [`process_source`], handing each tracking frame to `on_frame` as it
/// is produced. Frames are not retained afterwards.
pub fn process_source_with(
    source: &mut dyn FrameSource,
    pipeline: &mut FrameProcessingLoop,
    mut on_frame: impl FnMut(&TrackingFrame),
) -> RuntimeResult<ProcessingReport> {
    if !pipeline.is_tracking() {
        pipeline.start_tracking()?;
    }
    let mut report = ProcessingReport::default();
    while let Some(frame) = source.next_frame() {
        report.frames += 1;
        match pipeline.try_tick(&frame) {
            TickOutcome::Processed(output) => {
                report.processed += 1;
                let tracking = output.tracking;
                if tracking.midpoint.is_some() {
                    report.with_both_endpoints += 1;
                }
                if !tracking.pose_keypoints.is_empty() {
                    report.with_pose += 1;
                }
                on_frame(&tracking);
            }
            TickOutcome::Dropped | TickOutcome::Skipped => {}
            TickOutcome::Halted(message) => {
                report.halted = Some(message);
                break;
            }
        }
    }
    if pipeline.is_recording() {
        report.recorded = pipeline.stop_recording().map_err(|source| RuntimeError::Recorder {
            context: "finish".into(),
            source,
        })?;
    }
    pipeline.stop_tracking();
    info!(
        frames = report.frames,
        processed = report.processed,
        both_endpoints = report.with_both_endpoints,
        halted = report.halted.is_some(),
        "offline processing finished"
    );
    Ok(report)
}
