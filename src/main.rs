use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::{stream, StreamExt};
use knotline::{logging, Action, Change, Effect, Knot, KnotConfig, State, Tagged};

/// Runs a simulated download driven by a knot, logging every state.
#[derive(Parser, Debug)]
#[command(name = "knotline-demo", version, about, long_about = None)]
struct Cli {
    /// TOML file with knot settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of clock ticks to feed into the knot
    #[arg(short, long, default_value_t = 6)]
    ticks: u32,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info,knotline=debug")]
    log: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Idle,
    Fetching,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
struct Download {
    status: Status,
    progress: u8,
    ticks: u32,
}

impl State for Download {}

#[derive(Debug, Clone)]
enum Step {
    Tick,
    Progress(u8),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StepKind {
    Tick,
    Progress,
    Finished,
}

impl Tagged for Step {
    type Kind = StepKind;

    fn kind(&self) -> StepKind {
        match self {
            Step::Tick => StepKind::Tick,
            Step::Progress(_) => StepKind::Progress,
            Step::Finished => StepKind::Finished,
        }
    }
}

impl Change for Step {}

#[derive(Debug, Clone)]
enum Job {
    Fetch,
}

impl Tagged for Job {
    type Kind = ();

    fn kind(&self) -> Self::Kind {}
}

impl Action for Job {}

type DownloadKnot = Knot<Download, Step, Job>;

const TICK: Duration = Duration::from_millis(100);
const CHUNK: Duration = Duration::from_millis(60);

fn download_knot(config: KnotConfig, ticks: u32) -> Result<DownloadKnot> {
    let knot = DownloadKnot::builder()
        .config(config)
        .initial_state(Download {
            status: Status::Idle,
            progress: 0,
            ticks: 0,
        })
        .reduce(StepKind::Tick, |state, _| {
            let ticked = Download {
                ticks: state.ticks + 1,
                ..state.clone()
            };
            if state.status == Status::Idle {
                Effect::with(
                    Download {
                        status: Status::Fetching,
                        ..ticked
                    },
                    Job::Fetch,
                )
            } else {
                Effect::only(ticked)
            }
        })
        .reduce(StepKind::Progress, |state, step| match step {
            Step::Progress(progress) => Effect::only(Download {
                progress: *progress,
                ..state.clone()
            }),
            _ => Effect::only(state.clone()),
        })
        .reduce(StepKind::Finished, |state, _| {
            Effect::only(Download {
                status: Status::Done,
                progress: 100,
                ..state.clone()
            })
        })
        .event(move || {
            stream::unfold(0, move |sent| async move {
                if sent >= ticks {
                    return None;
                }
                tokio::time::sleep(TICK).await;
                Some((Step::Tick, sent + 1))
            })
        })
        .perform((), |jobs, _state| {
            jobs.flat_map(|_| {
                stream::iter([25u8, 50, 75])
                    .then(|progress| async move {
                        tokio::time::sleep(CHUNK).await;
                        Step::Progress(progress)
                    })
                    .chain(stream::once(async { Step::Finished }))
            })
        })
        .watch_state(|state| {
            tracing::info!(
                status = ?state.status,
                progress = state.progress,
                ticks = state.ticks,
                "State"
            );
        })
        .watch_action(|job| tracing::debug!(?job, "Action emitted"))
        .build()?;
    Ok(knot)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log);

    let config = match &cli.config {
        Some(path) => KnotConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => KnotConfig::default(),
    };

    let knot = download_knot(config, cli.ticks)?;
    let mut faults = knot.observe_faults();
    let mut states = knot.observe_state();

    let finished = async {
        while let Some(state) = states.next().await {
            if state.status == Status::Done && state.ticks >= cli.ticks {
                return;
            }
        }
    };
    let budget = TICK * (cli.ticks + 1) + CHUNK * 10;

    tokio::select! {
        result = tokio::time::timeout(budget, finished) => {
            if result.is_err() {
                tracing::warn!(?budget, "Download did not finish in time");
            }
        }
        Ok(fault) = faults.recv() => {
            tracing::error!(%fault, "Knot failed");
        }
    }

    let last = knot.current_state();
    knot.dispose();
    knot.disposed().await;
    println!(
        "{}: {:?} at {}% after {} ticks",
        knot.name(),
        last.status,
        last.progress,
        last.ticks
    );
    Ok(())
}
