use chrono::{DateTime, Local};
use clap::{error::ErrorKind, CommandFactory, Parser};
use serde::Serialize;
use std::{error::Error, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walktrack::{
    config::{Config, ConfigStore, FileConfigStore},
    runtime::WalkEvent,
    trace::{replay_realtime_with, replay_with, Trace},
    util::{format_distance, format_elapsed},
    SessionEnded, WalkSession, WalkType,
};

/// replay recorded pedometer and gps traces through a walk session
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Feeds a recorded trace of step counts, position fixes and pause/resume/end controls through a walk session and reports elapsed time, steps and distance walked."
)]
pub struct Cli {
    /// trace file: csv with the header `at_secs,kind,a,b`
    #[clap(required_unless_present = "list_walk_types")]
    trace: Option<PathBuf>,

    /// kind of walk (defaults to the configured walk type)
    #[clap(short = 'w', long, value_enum)]
    walk_type: Option<WalkType>,

    /// replay through live tick and sensor threads instead of offline
    #[clap(long)]
    realtime: bool,

    /// wall-clock length of one trace second in realtime mode
    #[clap(long)]
    tick_ms: Option<u64>,

    /// count steps from the first pedometer reading instead of using absolute values
    #[clap(long)]
    relative_steps: bool,

    /// print a status line on every tick
    #[clap(long)]
    follow: bool,

    /// print the final report as json
    #[clap(long)]
    json: bool,

    /// persist walk type, tick interval and step mode as the new defaults
    #[clap(long)]
    save_config: bool,

    /// list the available walk types and exit
    #[clap(long)]
    list_walk_types: bool,

    /// config file to use instead of the platform default
    #[clap(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Command line flags take precedence over stored defaults
    fn resolve(&self, base: Config) -> Config {
        Config {
            default_walk_type: self.walk_type.unwrap_or(base.default_walk_type),
            tick_interval_ms: self.tick_ms.unwrap_or(base.tick_interval_ms),
            relative_steps: self.relative_steps || base.relative_steps,
        }
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WalkReport {
    walk_type: WalkType,
    finished_at: DateTime<Local>,
    elapsed_seconds: u64,
    step_count: u64,
    distance_km: f64,
}

impl WalkReport {
    fn new(ended: &SessionEnded, fallback: WalkType) -> Self {
        Self {
            walk_type: ended.walk_type.unwrap_or(fallback),
            finished_at: Local::now(),
            elapsed_seconds: ended.totals.elapsed_seconds,
            step_count: ended.totals.step_count,
            distance_km: ended.totals.distance_km,
        }
    }

    fn summary_line(&self) -> String {
        format!(
            "Walk finished ({}): {}, {} steps, {}",
            self.walk_type,
            format_elapsed(self.elapsed_seconds),
            self.step_count,
            format_distance(self.distance_km)
        )
    }
}

fn status_line(session: &WalkSession) -> String {
    let snap = session.snapshot();
    format!(
        "{:>14}  {:>6} steps  {:>10}{}",
        format_elapsed(snap.elapsed_seconds),
        snap.step_count,
        format_distance(snap.distance_km),
        if snap.running { "" } else { "  (paused)" }
    )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_realtime(trace: &Trace, session: &mut WalkSession, tick: Duration, follow: bool) -> SessionEnded {
    // tick and sensor threads are released before this returns
    replay_realtime_with(trace, session, tick, |ev, s| {
        if follow && matches!(ev, WalkEvent::Tick) {
            println!("{}", status_line(s));
        }
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    if cli.list_walk_types {
        for wt in WalkType::ALL {
            println!("{:<11} {}", wt, wt.description());
        }
        return Ok(());
    }

    let store = cli.config_store();
    let cfg = cli.resolve(store.load());
    if cfg.tick_interval_ms == 0 {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, "tick interval must be positive")
            .exit();
    }
    if cli.save_config {
        store.save(&cfg)?;
        info!(path = %store.path().display(), "config saved");
    }

    let Some(path) = cli.trace.as_ref() else {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::MissingRequiredArgument, "a trace file is required")
            .exit();
    };

    let mut trace = Trace::from_path(path)?;
    if cfg.relative_steps {
        trace = trace.with_relative_steps();
    }

    let mut session = WalkSession::with_walk_type(cfg.default_walk_type);
    info!(walk_type = %cfg.default_walk_type, records = trace.len(), realtime = cli.realtime, "walk started");

    let ended = if cli.realtime {
        let tick = Duration::from_millis(cfg.tick_interval_ms);
        run_realtime(&trace, &mut session, tick, cli.follow)
    } else {
        let report = replay_with(&trace, &mut session, |ev, s| {
            if cli.follow && matches!(ev, WalkEvent::Tick) {
                println!("{}", status_line(s));
            }
        });
        report.ended
    };

    let report = WalkReport::new(&ended, cfg.default_walk_type);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary_line());
    }

    Ok(())
}
