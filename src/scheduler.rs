//! Fixed-interval poll scheduler
//!
//! Owns the repeating trigger that drives evaluation cycles. The schedule
//! lives on one background thread: it waits on an internal shutdown channel
//! with the poll interval as the timeout, so a timeout means "fire the next
//! cycle" and a message (or a dropped sender) means "stop". The first cycle
//! therefore fires only after one full interval has elapsed, and stopping
//! never interrupts a cycle that is already in progress.

use crate::error::SchedulerError;
use log::{debug, error, info};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle of the scheduler, one-way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, never started
    Idle,
    /// Background thread is firing cycles
    Running,
    /// Stopped for good; a scheduler is not restartable
    Stopped,
}

impl SchedulerState {
    fn name(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        }
    }
}

/// Repeating trigger for evaluation cycles
///
/// The tick callback is owned and invoked by the single scheduler thread,
/// which is what guarantees cycles never overlap: a cycle that outlives the
/// interval simply delays the next fire until it returns.
pub struct PollScheduler {
    interval: Duration,
    state: SchedulerState,
    shutdown_sender: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SchedulerState::Idle,
            shutdown_sender: None,
            thread_handle: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start firing `tick` every interval on a background thread
    ///
    /// Valid only from `Idle`; the first fire happens after one full
    /// interval, not immediately.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidState` if the scheduler was already
    /// started or stopped.
    pub fn start<F>(&mut self, tick: F) -> Result<(), SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.state != SchedulerState::Idle {
            return Err(SchedulerError::InvalidState {
                action: "start",
                state: self.state.name(),
            });
        }

        let (shutdown_sender, shutdown_receiver) = mpsc::channel();
        let interval = self.interval;

        let handle = thread::spawn(move || {
            Self::timer_loop(interval, shutdown_receiver, tick);
        });

        self.shutdown_sender = Some(shutdown_sender);
        self.thread_handle = Some(handle);
        self.state = SchedulerState::Running;
        info!("Poll scheduler started with interval {:?}", self.interval);
        Ok(())
    }

    /// Stop the schedule and wait for the thread to finish
    ///
    /// Cooperative: a cycle already in progress runs to completion before
    /// the thread exits. Stopping an already-stopped scheduler is a no-op;
    /// stopping from `Idle` just marks the scheduler spent.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Stopped => {
                debug!("Poll scheduler already stopped");
                return Ok(());
            }
            SchedulerState::Idle => {
                self.state = SchedulerState::Stopped;
                return Ok(());
            }
            SchedulerState::Running => {}
        }

        if let Some(sender) = self.shutdown_sender.take() {
            // The thread may have exited on its own; a send error only means
            // there is nobody left to signal.
            let _ = sender.send(());
        }

        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| {
                error!("Failed to join scheduler thread");
                SchedulerError::JoinFailed
            })?;
        }

        self.state = SchedulerState::Stopped;
        info!("Poll scheduler stopped");
        Ok(())
    }

    /// Body of the scheduler thread
    fn timer_loop<F>(interval: Duration, shutdown: Receiver<()>, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        debug!("Scheduler thread started");

        loop {
            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    // A panicking cycle must not take the schedule down; log
                    // it and alert again on the next tick.
                    if catch_unwind(AssertUnwindSafe(&mut tick)).is_err() {
                        error!("evaluation cycle panicked; schedule continues");
                    }
                }
                Ok(()) => {
                    debug!("Scheduler thread received shutdown signal");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Scheduler shutdown channel disconnected");
                    break;
                }
            }
        }

        debug!("Scheduler thread exiting");
    }
}
