//! Netscope - live packet observer
//!
//! Watches one or more interfaces, prints a live packet table and
//! optionally records traffic to pcap and JSON-lines files.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use netscope::capture::{list_interfaces, up_interfaces};
use netscope::config::Settings;
use netscope::{ConsoleReporter, PnetOpener, Supervisor, SupervisorEvent};

#[derive(Parser)]
#[command(name = "netscope")]
#[command(about = "Multi-interface live packet observer")]
struct Cli {
    /// Interface to capture on (repeatable; default: every interface that is up)
    #[arg(short, long = "interface")]
    interfaces: Vec<String>,

    /// Capture filter, e.g. "tcp port 80 and host 10.0.0.1"
    #[arg(short, long)]
    filter: Option<String>,

    /// Write raw frames to this pcap file
    #[arg(short, long)]
    write_to: Option<PathBuf>,

    /// Save one JSON record per frame to this file
    #[arg(short, long)]
    save_to: Option<PathBuf>,

    /// Dump each payload as hex and ASCII
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Show detected HTTP requests and responses
    #[arg(long = "httpprint")]
    http_print: bool,

    /// Maximum bytes kept per frame
    #[arg(long)]
    snaplen: Option<u32>,

    /// Do not put interfaces into promiscuous mode
    #[arg(long)]
    no_promisc: bool,

    /// Config file (default: /etc/netscope.conf if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List capture interfaces and exit
    #[arg(short, long)]
    list_interfaces: bool,
}

impl Cli {
    /// Command line flags take precedence over file and environment.
    fn apply(&self, settings: &mut Settings) {
        if !self.interfaces.is_empty() {
            settings.interfaces = self.interfaces.clone();
        }
        if let Some(filter) = &self.filter {
            settings.filter = Some(filter.clone()).filter(|f| !f.trim().is_empty());
        }
        if let Some(path) = &self.write_to {
            settings.write_to = Some(path.clone()).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(path) = &self.save_to {
            settings.save_to = Some(path.clone()).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(snaplen) = self.snaplen.filter(|&n| n > 0) {
            settings.snaplen = snaplen;
        }
        settings.verbose |= self.verbose;
        settings.http_print |= self.http_print;
        if self.no_promisc {
            settings.promiscuous = false;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_interfaces {
        for row in list_interfaces() {
            println!("{}", row);
        }
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut settings);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let interfaces = if settings.interfaces.is_empty() {
        let up = up_interfaces();
        if up.is_empty() {
            bail!("No interfaces are up; use -i to pick one");
        }
        tracing::info!("No interface given, capturing on: {}", up.join(", "));
        up
    } else {
        settings.interfaces.clone()
    };

    let supervisor = Supervisor::new(Arc::new(PnetOpener), Arc::new(ConsoleReporter::new()));

    let events = supervisor.event_sender();
    ctrlc::set_handler(move || {
        let _ = events.send(SupervisorEvent::Interrupt);
    })
    .context("Failed to install Ctrl-C handler")?;

    let reports = supervisor.run(settings.capture_configs(&interfaces))?;

    let mut failed = 0;
    for report in &reports {
        match &report.outcome {
            Ok(stats) => tracing::info!(
                interface = %report.interface,
                frames = stats.frames,
                raw_sink_failures = stats.sink_failures.raw,
                record_sink_failures = stats.sink_failures.record,
                "Capture finished"
            ),
            Err(e) => {
                failed += 1;
                tracing::error!(interface = %report.interface, "Capture failed: {}", e);
            }
        }
    }

    if failed == reports.len() {
        bail!("Capture failed on every interface");
    }
    Ok(())
}
