//! Runtime options recognized by the core, modeled as a plain `Config` struct
//! overridable by the CLI's `clap` flags and, for a few internal tunables not meant to be
//! promoted to user-facing flags, by `env_param`-style environment variables (see `tuning`).

/// The user-facing options table, one field per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `B`; `None` stands for an unbounded search (`B = ∞`).
    pub bound: Option<u32>,
    /// Stream newly added MSGS immediately as they're found.
    pub anytime: bool,
    /// Allow reopening a closed node when a strictly cheaper path to it is found.
    pub reopen_closed: bool,
    /// On open-list exhaustion, report the best-seen state as the solution.
    pub osp: bool,
    /// Enable MSGS-based pruning; when `false` the driver only tracks, never prunes.
    pub prune: bool,
    /// Treat every goal fact as soft (hard goal list is ignored).
    ///
    /// Applied once, at task-load time (the loader merges `hard_goals` into `soft_goals` before
    /// a `Task` is ever handed to a driver) rather than read by the drivers themselves — by the
    /// time a `Config` reaches `BestFirstDriver`/`TarjanDriver`/`IteratedDriver` the task already
    /// reflects it. Kept on `Config` anyway since it's one of the user-facing options table's
    /// rows and round-trips through the same flag/struct path as the rest.
    pub all_softgoals: bool,
    /// Upper cap for the iterated driver's per-task bound-increase rounds.
    pub max_bound: Option<u32>,
    /// Multiplicative bound-increase factor between rounds (must be `> 1`).
    pub step: f64,
    /// Deduplicate recognized neighbors before handing them to the refiner.
    pub unique_neighbors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bound: None,
            anytime: false,
            reopen_closed: false,
            osp: false,
            prune: true,
            all_softgoals: false,
            max_bound: None,
            step: crate::tuning::DEFAULT_STEP.get(),
            unique_neighbors: true,
        }
    }
}
