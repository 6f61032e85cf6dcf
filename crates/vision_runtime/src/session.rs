use crate::gate::{TickGate, TickPermit};
use crate::pipeline::{FrameProcessingLoop, TickOutcome};
use crate::{RuntimeError, RuntimeResult};
use crossbeam_channel::{bounded, Receiver, Sender};
use data_contracts::{CancelToken, TrackingFrame};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};
use vision_core::interfaces::{Frame, Recorder};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Tracked(Box<TrackingFrame>),
    /// A per-frame failure stopped the loop.
    Halted(String),
    Stopped(SessionSummary),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub offered: u64,
    pub processed: u64,
    pub dropped: u64,
    pub recorded: u64,
    pub halted: Option<String>,
}

/// Work handed to the session thread, handled strictly in order.
enum Command {
    Frame(Frame, TickPermit),
    StartRecording(Box<dyn Recorder>, Sender<()>),
    StopRecording(Sender<io::Result<u64>>),
}

/// A [`FrameProcessingLoop`] running on its own thread.
///
/// [`TrackingSession::offer`] hands a frame over only when the worker is
/// idle; otherwise the frame is dropped and counted. Events are best effort:
/// a consumer that stops reading loses them, and the final
/// [`SessionSummary`] still comes back from [`TrackingSession::stop`].
pub struct TrackingSession {
    commands: Option<Sender<Command>>,
    events: Receiver<SessionEvent>,
    gate: TickGate,
    cancel: CancelToken,
    offered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    worker: Option<JoinHandle<RuntimeResult<SessionSummary>>>,
}

impl TrackingSession {
    /// Start tracking on `pipeline` and move it to a worker thread.
    pub fn start(mut pipeline: FrameProcessingLoop) -> RuntimeResult<Self> {
        pipeline.start_tracking()?;
        let gate = pipeline.gate();
        let (command_tx, command_rx) = bounded::<Command>(1);
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);
        let cancel = CancelToken::new();
        let offered = Arc::new(AtomicU64::new(0));
        let dropped = Arc::new(AtomicU64::new(0));

        let worker = {
            let cancel = cancel.clone();
            let offered = Arc::clone(&offered);
            let dropped = Arc::clone(&dropped);
            std::thread::Builder::new()
                .name("tracking-session".into())
                .spawn(move || run_worker(pipeline, command_rx, event_tx, cancel, offered, dropped))
                .map_err(|e| RuntimeError::Worker(e.to_string()))?
        };

        info!("tracking session started");
        Ok(Self {
            commands: Some(command_tx),
            events: event_rx,
            gate,
            cancel,
            offered,
            dropped,
            worker: Some(worker),
        })
    }

    /// Hand `frame` to the worker. Returns `false` when it was dropped.
    pub fn offer(&self, frame: Frame) -> bool {
        self.offered.fetch_add(1, Ordering::SeqCst);
        let accepted = match (&self.commands, self.gate.try_enter()) {
            (Some(tx), Some(permit)) if !self.cancel.is_cancelled() => tx.try_send(Command::Frame(frame, permit)).is_ok(),
            _ => false,
        };
        if !accepted {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
        accepted
    }

    /// Record every frame processed from now on. Waits for the frame in
    /// flight, if any, to finish first.
    pub fn start_recording(&self, recorder: Box<dyn Recorder>) -> RuntimeResult<()> {
        self.request(|ack| Command::StartRecording(recorder, ack))
    }

    /// Finish the current recording; returns the number of frames written.
    pub fn stop_recording(&self) -> RuntimeResult<u64> {
        self.request(Command::StopRecording)?.map_err(|source| RuntimeError::Recorder {
            context: "finish".into(),
            source,
        })
    }

    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> RuntimeResult<T> {
        let tx = self.commands.as_ref().ok_or(RuntimeError::NotTracking)?;
        let (reply_tx, reply_rx) = bounded(1);
        tx.send(command(reply_tx)).map_err(|_| RuntimeError::NotTracking)?;
        reply_rx.recv().map_err(|_| RuntimeError::NotTracking)
    }

    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Stop accepting frames, let the worker drain, and wait for it.
    pub fn stop(mut self) -> RuntimeResult<SessionSummary> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> RuntimeResult<SessionSummary> {
        self.commands.take();
        let Some(worker) = self.worker.take() else {
            return Err(RuntimeError::NotTracking);
        };
        match worker.join() {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::Worker("tracking worker panicked".into())),
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
            if let Err(err) = self.shutdown() {
                warn!(error = %err, "tracking session ended with an error");
            }
        }
    }
}

fn run_worker(
    mut pipeline: FrameProcessingLoop,
    commands: Receiver<Command>,
    events: Sender<SessionEvent>,
    cancel: CancelToken,
    offered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
) -> RuntimeResult<SessionSummary> {
    let mut summary = SessionSummary::default();
    for command in commands.iter() {
        if cancel.is_cancelled() {
            break;
        }
        match command {
            Command::Frame(frame, permit) => {
                let outcome = pipeline.process(&frame);
                drop(permit);
                match outcome {
                    TickOutcome::Processed(output) => {
                        summary.processed += 1;
                        publish(&events, SessionEvent::Tracked(Box::new(output.tracking)));
                    }
                    TickOutcome::Halted(message) => {
                        summary.halted = Some(message.clone());
                        publish(&events, SessionEvent::Halted(message));
                        break;
                    }
                    TickOutcome::Dropped | TickOutcome::Skipped => {}
                }
            }
            Command::StartRecording(recorder, ack) => {
                pipeline.start_recording(recorder);
                let _ = ack.send(());
            }
            Command::StopRecording(reply) => {
                let result = pipeline.stop_recording();
                if let Ok(frames) = &result {
                    summary.recorded += frames;
                }
                let _ = reply.send(result);
            }
        }
    }
    summary.recorded += pipeline.stop_recording().map_err(|source| RuntimeError::Recorder {
        context: "finish".into(),
        source,
    })?;
    pipeline.stop_tracking();
    summary.offered = offered.load(Ordering::SeqCst);
    summary.dropped = dropped.load(Ordering::SeqCst);
    info!(
        offered = summary.offered,
        processed = summary.processed,
        dropped = summary.dropped,
        recorded = summary.recorded,
        "tracking session finished"
    );
    publish(&events, SessionEvent::Stopped(summary.clone()));
    Ok(summary)
}

/// Never blocks: the session owns the receiver, so a full queue would
/// otherwise stall shutdown.
fn publish(events: &Sender<SessionEvent>, event: SessionEvent) {
    if events.try_send(event).is_err() {
        debug!("session event dropped, consumer is not reading");
    }
}
