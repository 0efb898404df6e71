//! Thin CLI plumbing: argument parsing, task-file loading, driver selection and
//! JSON emission. Contains no search logic of its own — everything here is wiring onto
//! `mugs_search`'s public driver API.

mod output;
mod task_file;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mugs_model::eval::{Blind, Evaluator, HMax, LearningBlind};
use mugs_search::{BestFirstDriver, Config, IteratedDriver, TarjanDriver};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Driver {
    /// Component E.
    BestFirst,
    /// Component F.
    Tarjan,
    /// Component G.
    Iterated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Heuristic {
    /// The trivial `0`/`1` evaluator; useful to sanity-check a task file without trusting h-max.
    Blind,
    /// The relaxed-planning-graph fixpoint.
    HMax,
    /// `Blind` plus conflict learning; only `--driver tarjan` ever calls its `refine` hook.
    LearningBlind,
}

/// Computes Minimal Unsolvable Goal Subsets (MUGS) for a classical planning task with soft goals
/// under a cost budget.
#[derive(Debug, Parser)]
#[command(name = "mugs", version, about)]
struct Opt {
    /// Path to a JSON task file (see the crate documentation for the schema).
    task: PathBuf,

    /// Which search driver to run.
    #[arg(long, value_enum, default_value_t = Driver::BestFirst)]
    driver: Driver,

    /// Which reference evaluator to estimate per-fact costs with.
    #[arg(long, value_enum, default_value_t = Heuristic::HMax)]
    heuristic: Heuristic,

    /// `B`; omit for an unbounded search (`B = ∞`).
    #[arg(long)]
    bound: Option<u32>,

    /// Stream newly added MSGS to stdout as soon as they're found.
    #[arg(long)]
    anytime: bool,

    /// Allow reopening a closed node when a strictly cheaper path to it is found.
    #[arg(long = "reopen-closed")]
    reopen_closed: bool,

    /// On open-list exhaustion, report the best-seen state as the solution (best-first only).
    #[arg(long)]
    osp: bool,

    /// Disable MSGS-based pruning; the driver will only track, never prune.
    #[arg(long)]
    no_prune: bool,

    /// Treat every goal fact as soft, ignoring the task file's hard-goal list.
    #[arg(long = "all-softgoals")]
    all_softgoals: bool,

    /// Upper cap for the iterated driver's per-task bound-increase rounds.
    #[arg(long = "max-bound")]
    max_bound: Option<u32>,

    /// Multiplicative bound-increase factor between rounds (must be `> 1`).
    #[arg(long, default_value_t = mugs_search::tuning::DEFAULT_STEP.get())]
    step: f64,

    /// Deduplicate recognized neighbors before handing them to the refiner.
    #[arg(long = "no-unique-neighbors")]
    no_unique_neighbors: bool,

    /// Wall-clock search budget in seconds; on expiry the driver stops and reports whatever MSGS
    /// was found so far.
    #[arg(long = "time-limit-secs")]
    time_limit_secs: Option<u64>,

    /// Logging level: one of "error", "warn", "info", "debug", "trace".
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

impl Opt {
    fn to_config(&self) -> Config {
        Config {
            bound: self.bound,
            anytime: self.anytime,
            reopen_closed: self.reopen_closed,
            osp: self.osp,
            prune: !self.no_prune,
            all_softgoals: self.all_softgoals,
            max_bound: self.max_bound,
            step: self.step,
            unique_neighbors: !self.no_unique_neighbors,
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(opt.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing the tracing subscriber")?;

    let mut task = task_file::load_task(&opt.task)?;
    if opt.all_softgoals {
        task.soft_goals = task.hard_goals.drain(..).chain(task.soft_goals.drain(..)).collect();
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupt);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .context("installing the SIGTERM/SIGINT handler")?;
    }

    let deadline = opt.time_limit_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    let config = opt.to_config();
    let evaluator = match opt.heuristic {
        Heuristic::Blind => Evaluator::Blind(Blind),
        Heuristic::HMax => Evaluator::HMax(HMax::new(Rc::new(task.operators.clone()))),
        Heuristic::LearningBlind => Evaluator::LearningBlind(LearningBlind::new()),
    };

    let world = &task.world;
    let soft_goals = task.soft_goals.clone();

    let (document, out_of_resource) = match opt.driver {
        Driver::BestFirst => {
            let mut driver = BestFirstDriver::new(&task, evaluator, config)
                .with_deadline(deadline)
                .with_interrupt(Arc::clone(&interrupt));
            if opt.anytime {
                driver = driver.with_anytime_sink({
                    let world = world.clone();
                    let soft_goals = soft_goals.clone();
                    move |subset| println!("{}", output::anytime_line(&world, &soft_goals, &subset))
                });
            }
            let report = driver.run();
            let oor = matches!(report.termination, mugs_search::report::Termination::OutOfResource);
            (output::one_shot_document(world, &soft_goals, &report), oor)
        }
        Driver::Tarjan => {
            let mut driver = TarjanDriver::new(&task, evaluator, config)
                .with_deadline(deadline)
                .with_interrupt(Arc::clone(&interrupt));
            if opt.anytime {
                driver = driver.with_anytime_sink({
                    let world = world.clone();
                    let soft_goals = soft_goals.clone();
                    move |subset| println!("{}", output::anytime_line(&world, &soft_goals, &subset))
                });
            }
            let report = driver.run();
            let oor = matches!(report.termination, mugs_search::report::Termination::OutOfResource);
            (output::one_shot_document(world, &soft_goals, &report), oor)
        }
        Driver::Iterated => {
            let driver = IteratedDriver::new(&task, evaluator, config)
                .with_deadline(deadline)
                .with_interrupt(Arc::clone(&interrupt));
            let report = driver.run();
            let oor = matches!(report.termination, mugs_search::report::Termination::OutOfResource);
            (output::iterated_document(world, &soft_goals, &report), oor)
        }
    };

    println!("{}", serde_json::to_string_pretty(&document)?);

    if out_of_resource {
        tracing::warn!("search terminated out of resource (deadline or interrupt); MUGS above is partial");
        std::process::exit(3);
    }
    Ok(())
}
