//! Best-first search driver: the open/closed loop that threads the evaluator,
//! the pruning rule and the MSGS collection together, grounded in the reference planner's
//! `classical::search::plan_search` open-list loop (`BinaryHeap` ordered by a `Node`'s own `Ord`,
//! a closed set keyed by state, parent-pointer plan extraction) but generalized from a single
//! goal conjunction to the soft-goal antichain this engine tracks instead.

use crate::registry::{NodeStatus, StateId, StateRegistry};
use crate::report::{DriverReport, SearchStats, Termination};
use crate::Config;
use mugs_model::eval::{Estimate, Evaluator, EvaluatorOps};
use mugs_model::msgs::MsgsCollection;
use mugs_model::state::Fact;
use mugs_model::Task;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

/// One entry of the open list: a state-id ordered by `f = g + h`, ties broken by ascending
/// state-id, so expansion order is deterministic under a fixed tie-break rule.
///
/// `BinaryHeap` is a max-heap, so `Ord` is reversed with respect to `f`/`id` to make the smallest
/// `f` (and, among ties, the smallest id) pop first.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct OpenEntry {
    f: u32,
    id: StateId,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.cmp(&self.f).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A per-fact estimate treated as infinite ("never contributes a finite bound") is mapped to a
/// sentinel large enough to always sort last without overflowing `u32` addition.
const INFINITE: u32 = u32::MAX / 4;

fn estimate_to_u32(e: Estimate) -> u32 {
    e.unwrap_or(INFINITE)
}

/// Runs a single best-first search over `task` with the given `evaluator` and `config`.
///
/// Per 4.E's failure semantics, exhausting the open list is not itself a failure: the search
/// simply stops, and the accumulated MSGS/MUGS is the principal output. The driver never
/// terminates early on the first hard-goal-satisfying state it finds: every reachable state
/// (subject to pruning) is explored so the antichain of reached soft-goal subsets is complete.
pub struct BestFirstDriver<'t> {
    task: &'t Task,
    config: Config,
    evaluator: Evaluator,
    registry: StateRegistry,
    msgs: MsgsCollection<StateId>,
    stats: SearchStats,
    deadline: Option<Instant>,
    /// Polled alongside the deadline; set by an external SIGTERM handler so a clean exit
    /// with whatever MSGS was found so far is possible without a cancellation channel.
    interrupt: Option<Arc<AtomicBool>>,
    /// Invoked with each newly added MSGS, in `config.anytime` mode only. The CLI binary wires
    /// this to its own stdout line-printer; the library itself never touches
    /// stdout directly.
    anytime_sink: Option<Box<dyn FnMut(mugs_collections::GoalSubset)>>,
}

impl<'t> BestFirstDriver<'t> {
    pub fn new(task: &'t Task, evaluator: Evaluator, config: Config) -> Self {
        let msgs = MsgsCollection::new(task.hard_goals.clone(), task.soft_goals.clone());
        BestFirstDriver {
            task,
            config,
            evaluator,
            registry: StateRegistry::new(),
            msgs,
            stats: SearchStats::default(),
            anytime_sink: None,
            deadline: None,
            interrupt: None,
        }
    }

    /// Sets a wall-clock deadline; polled once per expansion, never via a timer thread.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Polls `flag` at the same cadence as the deadline; a SIGTERM handler setting it to `true`
    /// makes the next poll terminate the search as [`Termination::OutOfResource`], preserving the
    /// MSGS found so far.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Pre-populates the MSGS antichain before the first expansion, used by the iterated
    /// relaxation driver to seed a task's search from its lower-cover neighbors' MSGS.
    pub fn seed_msgs(mut self, subsets: impl IntoIterator<Item = mugs_collections::GoalSubset>) -> Self {
        for s in subsets {
            self.msgs.add(s);
        }
        self
    }

    /// Registers a callback fired with every newly added MSGS when `config.anytime` is set.
    pub fn with_anytime_sink(mut self, sink: impl FnMut(mugs_collections::GoalSubset) + 'static) -> Self {
        self.anytime_sink = Some(Box::new(sink));
        self
    }

    fn goal_facts(&self) -> Vec<Fact> {
        self.task.all_goal_facts()
    }

    fn f_value(&self, g: u32, estimates: &[Estimate]) -> u32 {
        let h: u32 = estimates
            .iter()
            .map(|&e| estimate_to_u32(e))
            .fold(0u32, |acc, c| acc.saturating_add(c));
        g.saturating_add(h)
    }

    pub fn run(mut self) -> DriverReport {
        let goal_facts = self.goal_facts();
        let mut open: BinaryHeap<OpenEntry> = BinaryHeap::new();

        let root_state = self.task.initial_state.clone();
        let root = self.registry.insert_root(root_state);
        let root_estimates = self.evaluator.estimate(self.registry.state(root), 0, &goal_facts);
        open.push(OpenEntry {
            f: self.f_value(0, &root_estimates),
            id: root,
        });

        let poll_every = crate::tuning::DEADLINE_POLL_EVERY_N.get().max(1);
        let mut since_poll = 0u32;

        let termination = loop {
            let Some(entry) = open.pop() else {
                break Termination::OpenExhausted;
            };

            if matches!(self.registry.node(entry.id).status, NodeStatus::Closed) {
                continue;
            }

            since_poll += 1;
            if since_poll >= poll_every {
                since_poll = 0;
                let timed_out = self.deadline.map_or(false, |d| Instant::now() >= d);
                let interrupted = self.interrupt.as_ref().map_or(false, |f| f.load(AtomicOrdering::Relaxed));
                if timed_out || interrupted {
                    break Termination::OutOfResource;
                }
            }

            self.registry.set_status(entry.id, NodeStatus::Closed);
            self.stats.expansions += 1;
            let g = self.registry.node(entry.id).g;

            let state = self.registry.state(entry.id).clone();
            self.msgs.track(&state, entry.id);

            for op in self.task.operators.applicable_in(&state) {
                let gp = g.saturating_add(self.task.operators.cost(op));
                if self.config.bound.map_or(false, |b| gp >= b) {
                    continue;
                }

                let child_state = state.successor(self.task.operators.effects(op));
                self.stats.generated += 1;
                let (child_id, is_new) = self.registry.get_or_create(child_state.clone(), entry.id, op, gp);
                let child_node = self.registry.node(child_id);

                let mut reopened = false;
                let proceed = if is_new {
                    true
                } else {
                    match child_node.status {
                        NodeStatus::Dead => false,
                        NodeStatus::Open => gp < child_node.g,
                        NodeStatus::Closed if self.config.reopen_closed && gp < child_node.g => {
                            reopened = true;
                            true
                        }
                        NodeStatus::Closed => false,
                    }
                };
                if !proceed {
                    continue;
                }

                let estimates = self.evaluator.estimate(&child_state, gp, &goal_facts);
                let per_fact_cost = |f: Fact| -> Estimate {
                    goal_facts
                        .iter()
                        .position(|&gf| gf == f)
                        .and_then(|i| estimates.get(i).copied())
                        .unwrap_or(None)
                };
                let budget_remaining = self.config.bound.map(|b| b.saturating_sub(gp));
                let dead = if self.config.prune {
                    estimates.iter().any(|e| e.is_none())
                        || self.msgs.prune(&child_state, child_id, per_fact_cost, budget_remaining)
                } else {
                    self.msgs.track(&child_state, child_id);
                    false
                };

                if dead {
                    self.stats.pruned += 1;
                    self.registry.set_status(child_id, NodeStatus::Dead);
                    continue;
                }

                if reopened {
                    self.stats.reopened += 1;
                }
                self.registry.relink(child_id, entry.id, op, gp);
                self.registry.set_status(child_id, NodeStatus::Open);
                let child_f = self.f_value(gp, &estimates);
                open.push(OpenEntry { f: child_f, id: child_id });
                // `states_since_last_addition() == 0` tells apart "this expansion just grew the
                // antichain" from "the antichain's last growth was several expansions ago";
                // without it, every subsequent sibling operator would re-emit the same MSGS.
                if self.config.anytime && self.msgs.states_since_last_addition() == 0 {
                    if let Some(added) = self.msgs.last_added() {
                        tracing::info!(?added, "anytime MSGS");
                        if let Some(sink) = self.anytime_sink.as_mut() {
                            sink(added);
                        }
                    }
                }
            }
        };

        let plan = if self.config.osp {
            self.msgs.best().map(|(_, witness)| self.registry.extract_plan(*witness))
        } else {
            None
        };

        DriverReport {
            termination,
            plan,
            solvable: self.msgs.hard_ever_satisfied(),
            msgs: self.msgs.iter().copied().collect(),
            mugs: self.msgs.get_mugs(),
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mugs_model::eval::Blind;
    use mugs_model::state::{Operator, VarId, Variable, World};
    use mugs_model::task::Mutexes;
    use mugs_model::Operators;

    fn chain_task() -> Task {
        let world = World::new(vec![Variable {
            name: "loc".into(),
            domain: vec!["a".into(), "b".into(), "c".into()],
        }]);
        let init = world.make_initial_state();
        let mut ops = Operators::new();
        ops.push(Operator {
            name: "a-to-b".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 1,
        });
        ops.push(Operator {
            name: "b-to-c".into(),
            precond: vec![Fact::new(VarId::from(0), 1)],
            effects: vec![Fact::new(VarId::from(0), 2)],
            cost: 1,
        });
        let soft_at_b = Fact::new(VarId::from(0), 1);
        let soft_at_c = Fact::new(VarId::from(0), 2);
        Task::new(world, init, ops, vec![], vec![soft_at_b, soft_at_c], Mutexes::new(), vec![]).unwrap()
    }

    #[test]
    fn finds_the_full_soft_goal_subset_when_unbounded() {
        let task = chain_task();
        let driver = BestFirstDriver::new(&task, Evaluator::Blind(Blind), Config::default());
        let report = driver.run();
        assert_eq!(report.termination, Termination::OpenExhausted);
        assert!(report.mugs.is_empty(), "both soft goals are jointly reachable: no MUGS");
        assert!(
            report.msgs.iter().any(|s| s.card() == 2),
            "the full soft-goal subset should have been reached"
        );
    }

    #[test]
    fn bound_below_total_cost_makes_the_unreachable_goal_a_mugs() {
        let task = chain_task();
        let mut config = Config::default();
        config.bound = Some(2); // reaching loc=c costs exactly 2, which the strict `<` rejects
        let driver = BestFirstDriver::new(&task, Evaluator::Blind(Blind), config);
        let report = driver.run();
        assert_eq!(report.mugs.len(), 1);
        assert_eq!(report.mugs[0].card(), 1); // {loc=c} alone: {loc=b} remains reachable
    }

    #[test]
    fn osp_reports_best_seen_plan() {
        let task = chain_task();
        let mut config = Config::default();
        config.osp = true;
        let driver = BestFirstDriver::new(&task, Evaluator::Blind(Blind), config);
        let report = driver.run();
        let plan = report.plan.expect("osp mode must report a plan");
        assert_eq!(plan.len(), 2);
    }
}
