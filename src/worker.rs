//! Per-interface capture worker.
//!
//! A worker walks `Opening -> Filtering -> SinksInitializing -> Streaming
//! -> Stopped`. Filtering is skipped when no filter is configured. Any
//! error before streaming goes straight to `Stopped` and ends only this
//! worker; the capture handle and sinks are released on every exit path.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::capture::{CaptureOpener, FrameSource, RawFrame, SourceEvent};
use crate::config::CaptureConfig;
use crate::detector::Classifier;
use crate::error::WorkerError;
use crate::parser::{FrameDecoder, PacketDecoder};
use crate::reporter::{PacketReporter, RenderOptions};
use crate::sink::{SinkFailures, SinkSet};
use crate::supervisor::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Opening,
    Filtering,
    SinksInitializing,
    Streaming,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Opening => "opening",
            WorkerState::Filtering => "filtering",
            WorkerState::SinksInitializing => "sinks-initializing",
            WorkerState::Streaming => "streaming",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters for one completed streaming run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub frames: u64,
    pub sink_failures: SinkFailures,
}

/// Captures, renders and records the traffic of one interface.
pub struct InterfaceWorker {
    config: CaptureConfig,
    opener: Arc<dyn CaptureOpener>,
    reporter: Arc<dyn PacketReporter>,
    decoder: FrameDecoder,
    classifier: Classifier,
    render: RenderOptions,
    state: WorkerState,
}

impl InterfaceWorker {
    pub fn new(
        config: CaptureConfig,
        opener: Arc<dyn CaptureOpener>,
        reporter: Arc<dyn PacketReporter>,
    ) -> Self {
        let classifier = Classifier::new().with_http_print(config.http_print);
        let render = RenderOptions {
            verbose: config.verbose,
            http_print: config.http_print,
        };
        Self {
            config,
            opener,
            reporter,
            decoder: FrameDecoder::new(),
            classifier,
            render,
            state: WorkerState::Opening,
        }
    }

    pub fn interface(&self) -> &str {
        &self.config.interface
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run until the capture closes or `stop` is triggered.
    ///
    /// The stop signal is checked between frames and after every idle
    /// poll, so a stop request is honoured within one poll interval.
    pub fn run(&mut self, stop: &StopSignal) -> Result<WorkerStats, WorkerError> {
        let result = self.stream(stop);
        self.transition(WorkerState::Stopped);
        result
    }

    fn stream(&mut self, stop: &StopSignal) -> Result<WorkerStats, WorkerError> {
        let mut source = self.opener.open(&self.config.interface, &self.config.open)?;

        if let Some(filter) = self.config.filter.clone() {
            self.transition(WorkerState::Filtering);
            source.set_filter(&filter)?;
            debug!(interface = %self.config.interface, filter = %filter, "Filter installed");
        }

        self.transition(WorkerState::SinksInitializing);
        let mut sinks = SinkSet::open(
            self.config.raw_sink.as_deref(),
            self.config.record_sink.as_deref(),
            self.config.open.snaplen,
            source.link_type(),
        )
        .map_err(WorkerError::SinkOpen)?;

        self.transition(WorkerState::Streaming);
        self.reporter.on_start(&self.config.interface);

        let frames = self.pump(source.as_mut(), &mut sinks, stop);

        self.reporter.on_stop(&self.config.interface);
        Ok(WorkerStats {
            frames,
            sink_failures: sinks.failures(),
        })
    }

    fn pump(&self, source: &mut dyn FrameSource, sinks: &mut SinkSet, stop: &StopSignal) -> u64 {
        let mut frames = 0;
        while !stop.is_triggered() {
            match source.next_event() {
                SourceEvent::Frame(frame) => {
                    self.handle_frame(&frame, sinks);
                    frames += 1;
                }
                SourceEvent::Idle => continue,
                SourceEvent::Closed => {
                    info!(interface = %source.interface_name(), "Capture closed");
                    break;
                }
            }
        }
        frames
    }

    /// Render then persist one frame.
    fn handle_frame(&self, frame: &RawFrame, sinks: &mut SinkSet) {
        let decoded = self.decoder.decode(frame);
        let packet = self.classifier.classify(frame.timestamp, decoded);
        self.reporter.report(&packet, self.render);
        sinks.write(frame, &packet);
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(
            interface = %self.config.interface,
            "Worker {} -> {}", self.state, next
        );
        self.state = next;
    }
}
