//! Driver-agnostic output: why a search stopped, what it found, and bookkeeping counters.

use mugs_collections::GoalSubset;
use mugs_model::state::OpId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The open list emptied out: the reachable (pruned) state space was fully explored.
    OpenExhausted,
    /// The wall-clock deadline was hit; the MSGS/MUGS below reflect whatever was found so far.
    OutOfResource,
}

#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub expansions: u64,
    pub generated: u64,
    pub pruned: u64,
    pub reopened: u64,
    pub refinements: u64,
}

#[derive(Debug, Clone)]
pub struct DriverReport {
    pub termination: Termination,
    /// Populated only in `osp` mode: the operator sequence reaching the best state found.
    pub plan: Option<Vec<OpId>>,
    /// Whether any processed state satisfied every hard goal.
    pub solvable: bool,
    pub msgs: Vec<GoalSubset>,
    pub mugs: Vec<GoalSubset>,
    pub stats: SearchStats,
}

/// One relaxed task's final verdict, as emitted by the iterated relaxation driver.
#[derive(Debug, Clone)]
pub struct TaskMugs {
    pub name: String,
    pub solvable: bool,
    pub mugs: Vec<GoalSubset>,
}

/// The per-task MUGS report the iterated relaxation driver produces once every
/// task in its lattice has been resolved, either by its own sub-search or by upward propagation.
#[derive(Debug, Clone)]
pub struct IteratedReport {
    pub termination: Termination,
    pub tasks: Vec<TaskMugs>,
    pub stats: SearchStats,
}
