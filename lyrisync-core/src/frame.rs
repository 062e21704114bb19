//! Tokio host loop that produces animation frames.
//!
//! Anything that can call [`crate::clock::VisualClock::tick`] with a delta can
//! drive the visual clock; this is the driver used when there is no
//! compositor to ask for frames.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One produced frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Sequence number, starting at 1 for each run
    pub frame: u64,
    /// Seconds since the previous frame of this run; 0 for the first
    pub delta: f64,
}

/// Starts and stops a ticking task at a fixed frame rate
#[derive(Debug)]
pub struct FrameDriver {
    period: Duration,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl FrameDriver {
    #[must_use]
    pub fn new(frame_rate: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / frame_rate.max(1),
            cancel: None,
            handle: None,
        }
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start producing frames into `tx`. No-op while already running.
    ///
    /// Frames are dropped rather than queued when the receiver lags.
    pub fn start(&mut self, tx: mpsc::Sender<FrameTick>) {
        if self.is_running() {
            return;
        }

        let cancel = CancellationToken::new();
        let period = self.period;
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last: Option<Instant> = None;
            let mut frame = 0_u64;

            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    now = interval.tick() => {
                        frame += 1;
                        let delta = last.map_or(0.0, |prev| now.duration_since(prev).as_secs_f64());
                        last = Some(now);

                        match tx.try_send(FrameTick { frame, delta }) {
                            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        }
                    }
                }
            }
            debug!("Frame driver stopped after {frame} frames");
        });

        self.cancel = Some(cancel);
        self.handle = Some(handle);
    }

    /// Stop producing frames
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.handle = None;
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
