//! Worker supervision.
//!
//! The supervisor starts one thread per interface, then blocks until
//! either an interrupt arrives or every worker has exited on its own.
//! It then raises the shared stop signal and joins all workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info};

use crate::capture::CaptureOpener;
use crate::config::CaptureConfig;
use crate::error::WorkerError;
use crate::reporter::PacketReporter;
use crate::worker::{InterfaceWorker, WorkerStats};

/// Shared flag telling every worker to stop streaming.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The user asked to stop (Ctrl-C)
    Interrupt,
    /// A worker returned, successfully or not
    WorkerExited(String),
}

/// How one worker ended.
#[derive(Debug)]
pub struct WorkerReport {
    pub interface: String,
    pub outcome: Result<WorkerStats, WorkerError>,
}

pub struct Supervisor {
    opener: Arc<dyn CaptureOpener>,
    reporter: Arc<dyn PacketReporter>,
    stop: StopSignal,
    events_tx: Sender<SupervisorEvent>,
    events_rx: Receiver<SupervisorEvent>,
}

impl Supervisor {
    pub fn new(opener: Arc<dyn CaptureOpener>, reporter: Arc<dyn PacketReporter>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            opener,
            reporter,
            stop: StopSignal::new(),
            events_tx,
            events_rx,
        }
    }

    /// Sender for delivering an interrupt from a signal handler.
    pub fn event_sender(&self) -> Sender<SupervisorEvent> {
        self.events_tx.clone()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run one worker per config and wait for them to finish.
    ///
    /// Reports are returned in config order.
    pub fn run(self, configs: Vec<CaptureConfig>) -> Result<Vec<WorkerReport>> {
        if configs.is_empty() {
            bail!("No interfaces to capture on");
        }

        let mut handles = Vec::with_capacity(configs.len());
        for config in configs {
            let interface = config.interface.clone();
            match self.spawn(config) {
                Ok(handle) => handles.push((interface, handle)),
                Err(e) => {
                    self.stop.trigger();
                    join_all(handles);
                    return Err(e);
                }
            }
        }

        info!("Capturing on {} interface(s)", handles.len());
        self.wait(handles.len());

        self.stop.trigger();
        Ok(join_all(handles))
    }

    fn spawn(
        &self,
        config: CaptureConfig,
    ) -> Result<JoinHandle<Result<WorkerStats, WorkerError>>> {
        let interface = config.interface.clone();
        let mut worker = InterfaceWorker::new(config, self.opener.clone(), self.reporter.clone());
        let stop = self.stop.clone();

        let notice = ExitNotice {
            interface: interface.clone(),
            events: self.events_tx.clone(),
        };

        thread::Builder::new()
            .name(format!("capture-{}", interface))
            .spawn(move || {
                let _notice = notice;
                let outcome = worker.run(&stop);
                if let Err(e) = &outcome {
                    error!(interface = %worker.interface(), "Worker stopped: {}", e);
                }
                outcome
            })
            .with_context(|| format!("Failed to spawn worker for {}", interface))
    }

    /// Block until an interrupt or until `running` workers have all exited.
    fn wait(&self, mut running: usize) {
        while running > 0 {
            match self.events_rx.recv() {
                Ok(SupervisorEvent::Interrupt) => {
                    info!("Interrupt received, stopping workers");
                    return;
                }
                Ok(SupervisorEvent::WorkerExited(interface)) => {
                    running -= 1;
                    debug!(interface = %interface, remaining = running, "Worker exited");
                }
                Err(_) => return,
            }
        }
        info!("All workers exited");
    }
}

/// Announces a worker's exit when its thread ends, including by panic.
struct ExitNotice {
    interface: String,
    events: Sender<SupervisorEvent>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let interface = std::mem::take(&mut self.interface);
        let _ = self.events.send(SupervisorEvent::WorkerExited(interface));
    }
}

fn join_all(
    handles: Vec<(String, JoinHandle<Result<WorkerStats, WorkerError>>)>,
) -> Vec<WorkerReport> {
    handles
        .into_iter()
        .map(|(interface, handle)| {
            let outcome = handle.join().unwrap_or(Err(WorkerError::Panicked));
            WorkerReport { interface, outcome }
        })
        .collect()
}
