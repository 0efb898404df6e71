//! Iterated relaxation driver: sequences searches over a finite partial order of
//! task relaxations, propagating solvability upward and seeding each task's search from the
//! MSGS already proven reachable by its lower-cover neighbors.
//!
//! Grounded in the reference planner's landmark-graph style "solve a family of related problems,
//! reuse what earlier members already proved" drivers (e.g. `lcp.rs`'s loop over successive
//! relaxations of the same base encoding): each relaxed task is just another `Task`, built once
//! up front by applying its `init_override` and `disabled_operators` on top of the base task, and
//! driven through the same `BestFirstDriver` every one-shot invocation uses.
//!
//! Per task, `Config::max_bound`/`step` additionally drive a bound ladder: an unsolved round
//! below `max_bound` is re-run with `bound` raised by `step` and the root re-pushed, before the
//! task is handed its final verdict and the lattice moves on to the next task.

use crate::best_first::BestFirstDriver;
use crate::report::{IteratedReport, SearchStats, TaskMugs, Termination};
use crate::Config;
use mugs_collections::GoalSubset;
use mugs_model::eval::{Blind, Evaluator, HMax, LearningBlind};
use mugs_model::msgs::MsgsCollection;
use mugs_model::{Operators, Task};
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Runtime bookkeeping for one node of the relaxed-task lattice, layered on top of its static
/// [`mugs_model::RelaxedTaskDef`] declaration.
struct TaskRuntime {
    name: String,
    lower_cover: Vec<String>,
    upper_cover: Vec<String>,
    task: Task,
    msgs: MsgsCollection<()>,
    solvable: bool,
    resolved: bool,
}

/// Drives the relaxed-task lattice declared on a [`Task`]'s `relaxed_tasks` to completion.
///
/// When the task declares no relaxations, the driver degenerates to a single unnamed task wrapping
/// the base problem, so `--driver iterated` remains usable on a plain (non-lattice) task file.
pub struct IteratedDriver<'t> {
    base: &'t Task,
    evaluator: Evaluator,
    config: Config,
    deadline: Option<Instant>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<'t> IteratedDriver<'t> {
    pub fn new(base: &'t Task, evaluator: Evaluator, config: Config) -> Self {
        IteratedDriver {
            base,
            evaluator,
            config,
            deadline: None,
            interrupt: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Propagated to every sub-search's own `with_interrupt` (see `BestFirstDriver::with_interrupt`).
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Builds the full `Task` a [`mugs_model::RelaxedTaskDef`] describes: the base world, goals
    /// and mutexes, with the relaxation's initial-state override applied and its named operators
    /// removed.
    fn resolve(&self, def: &mugs_model::RelaxedTaskDef) -> Task {
        let mut init = self.base.initial_state.clone();
        init.apply(&def.init_override);

        let mut ops = Operators::new();
        for op in self.base.operators.iter() {
            if !def.disabled_operators.iter().any(|d| d == &self.base.operators.get(op).name) {
                ops.push(self.base.operators.get(op).clone());
            }
        }

        Task::new(
            self.base.world.clone(),
            init,
            ops,
            self.base.hard_goals.clone(),
            self.base.soft_goals.clone(),
            self.base.mutexes.clone(),
            Vec::new(),
        )
        .expect("a relaxed task built from an already-validated task must itself validate")
    }

    /// Rebuilds an evaluator of the same kind as `self.evaluator`, bound to `operators` instead
    /// of the base task's (needed since `HMax` owns its operator table).
    fn retarget_evaluator(&self, operators: &Operators) -> Evaluator {
        match &self.evaluator {
            Evaluator::Blind(_) => Evaluator::Blind(Blind),
            Evaluator::HMax(_) => Evaluator::HMax(HMax::new(Rc::new(operators.clone()))),
            Evaluator::LearningBlind(_) => Evaluator::LearningBlind(LearningBlind::new()),
        }
    }

    pub fn run(mut self) -> IteratedReport {
        let mut runtimes: Vec<TaskRuntime> = if self.base.relaxed_tasks.is_empty() {
            vec![TaskRuntime {
                name: "root".to_string(),
                lower_cover: Vec::new(),
                upper_cover: Vec::new(),
                task: self.base.clone(),
                msgs: MsgsCollection::new(self.base.hard_goals.clone(), self.base.soft_goals.clone()),
                solvable: false,
                resolved: false,
            }]
        } else {
            self.base
                .relaxed_tasks
                .iter()
                .map(|def| TaskRuntime {
                    name: def.name.clone(),
                    lower_cover: def.lower_cover.clone(),
                    upper_cover: def.upper_cover.clone(),
                    task: self.resolve(def),
                    msgs: MsgsCollection::new(self.base.hard_goals.clone(), self.base.soft_goals.clone()),
                    solvable: false,
                    resolved: false,
                })
                .collect()
        };

        let mut stats = SearchStats::default();
        let mut termination = Termination::OpenExhausted;

        loop {
            let Some(next) = self.pick_next(&runtimes) else { break };

            let seed: Vec<GoalSubset> = runtimes[next]
                .lower_cover
                .iter()
                .filter_map(|name| runtimes.iter().find(|t| &t.name == name))
                .flat_map(|t| t.msgs.iter().copied())
                .collect();

            // Bound ladder: a round that leaves the task unsolved and still under `max_bound` is
            // re-run with the bound raised by `step`, the root re-pushed, rather than accepting
            // the round's verdict as final. A task with no `max_bound` configured runs exactly
            // one round, same as before.
            let mut bound = self.config.bound;
            let mut out_of_resource = false;
            loop {
                let mut round_config = self.config.clone();
                round_config.bound = bound;

                let evaluator = self.retarget_evaluator(&runtimes[next].task.operators);
                let mut driver = BestFirstDriver::new(&runtimes[next].task, evaluator, round_config)
                    .seed_msgs(seed.clone())
                    .with_deadline(self.deadline);
                if let Some(flag) = &self.interrupt {
                    driver = driver.with_interrupt(Arc::clone(flag));
                }
                let report = driver.run();

                stats.expansions += report.stats.expansions;
                stats.generated += report.stats.generated;
                stats.pruned += report.stats.pruned;
                stats.reopened += report.stats.reopened;
                stats.refinements += report.stats.refinements;

                for s in &report.msgs {
                    runtimes[next].msgs.add(*s);
                }
                runtimes[next].msgs.set_hard_ever_satisfied(report.solvable);
                runtimes[next].solvable = report.solvable;

                if matches!(report.termination, Termination::OutOfResource) {
                    out_of_resource = true;
                    break;
                }

                let (Some(max_bound), Some(current)) = (self.config.max_bound, bound) else { break };
                if report.solvable || current >= max_bound {
                    break;
                }
                let raised = ((current as f64 * self.config.step).ceil() as u32).max(current + 1).min(max_bound);
                if raised <= current {
                    break;
                }
                bound = Some(raised);
            }
            runtimes[next].resolved = true;

            if out_of_resource {
                termination = Termination::OutOfResource;
            }

            self.propagate_upward(&mut runtimes, next);

            if matches!(termination, Termination::OutOfResource) {
                break;
            }
        }

        let tasks = runtimes
            .into_iter()
            .map(|t| TaskMugs {
                name: t.name,
                solvable: t.solvable,
                mugs: t.msgs.get_mugs(),
            })
            .collect();

        IteratedReport { termination, tasks, stats }
    }

    /// Picks the next unresolved task whose entire lower-cover has already been resolved,
    /// falling back to any remaining unresolved task (covers a malformed or cyclic lattice).
    fn pick_next(&self, runtimes: &[TaskRuntime]) -> Option<usize> {
        runtimes
            .iter()
            .position(|t| !t.resolved && t.lower_cover.iter().all(|name| self.is_resolved(runtimes, name)))
            .or_else(|| runtimes.iter().position(|t| !t.resolved))
    }

    fn is_resolved(&self, runtimes: &[TaskRuntime], name: &str) -> bool {
        runtimes.iter().find(|t| t.name == name).map_or(true, |t| t.resolved)
    }

    /// Step 2 of 4.G: a solvable task makes every task in its upper-cover solvable too, their MSGS
    /// overwritten (not merged) by the solving task's, and resolved without running their own
    /// search. Propagates transitively through the upper-cover chain.
    fn propagate_upward(&self, runtimes: &mut Vec<TaskRuntime>, from: usize) {
        if !runtimes[from].solvable {
            return;
        }
        let mut frontier = runtimes[from].upper_cover.clone();
        let msgs_snapshot: Vec<GoalSubset> = runtimes[from].msgs.iter().copied().collect();

        while let Some(name) = frontier.pop() {
            let Some(idx) = runtimes.iter().position(|t| t.name == name) else { continue };
            if runtimes[idx].resolved {
                continue;
            }
            runtimes[idx].msgs = MsgsCollection::new(self.base.hard_goals.clone(), self.base.soft_goals.clone());
            for s in &msgs_snapshot {
                runtimes[idx].msgs.add(*s);
            }
            runtimes[idx].msgs.set_hard_ever_satisfied(true);
            runtimes[idx].solvable = true;
            runtimes[idx].resolved = true;
            frontier.extend(runtimes[idx].upper_cover.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mugs_model::state::{Fact, Operator, VarId, Variable, World};
    use mugs_model::task::Mutexes;
    use mugs_model::RelaxedTaskDef;

    /// Two relaxations of a one-operator task: `tight` disables the only operator (unsolvable
    /// soft goal), `loose` keeps it (solvable). `tight` sits below `loose` in the lattice.
    fn lattice_task() -> Task {
        let world = World::new(vec![Variable {
            name: "loc".into(),
            domain: vec!["a".into(), "b".into()],
        }]);
        let init = world.make_initial_state();
        let mut ops = Operators::new();
        ops.push(Operator {
            name: "a-to-b".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 1,
        });
        let soft = Fact::new(VarId::from(0), 1);

        let tight = RelaxedTaskDef {
            name: "tight".into(),
            lower_cover: vec![],
            upper_cover: vec!["loose".into()],
            init_override: vec![],
            disabled_operators: vec!["a-to-b".into()],
        };
        let loose = RelaxedTaskDef {
            name: "loose".into(),
            lower_cover: vec!["tight".into()],
            upper_cover: vec![],
            init_override: vec![],
            disabled_operators: vec![],
        };

        Task::new(world, init, ops, vec![], vec![soft], Mutexes::new(), vec![tight, loose]).unwrap()
    }

    #[test]
    fn resolves_every_task_and_reports_a_mugs_for_the_tight_relaxation() {
        let task = lattice_task();
        let driver = IteratedDriver::new(&task, Evaluator::Blind(Blind), Config::default());
        let report = driver.run();

        assert_eq!(report.tasks.len(), 2);
        // both tasks declare no hard goals, so `solvable` (hard-goal reachability) is vacuously
        // true for each; what differs is whether the lone soft goal is itself reachable.
        let tight = report.tasks.iter().find(|t| t.name == "tight").unwrap();
        assert_eq!(tight.mugs.len(), 1);
        assert_eq!(tight.mugs[0].card(), 1);

        let loose = report.tasks.iter().find(|t| t.name == "loose").unwrap();
        assert!(loose.mugs.is_empty());
    }

    #[test]
    fn bound_ladder_raises_the_bound_across_rounds_until_the_task_solves() {
        // Two sequential unit-cost operators; the hard goal only becomes reachable at g=2. A
        // starting bound of 1 prunes even the first step (`gp >= bound`), so round one must fail
        // and the ladder must raise the bound (to 3, given `step = 3.0`) before a second round
        // can reach the goal.
        let world = World::new(vec![Variable {
            name: "stage".into(),
            domain: vec!["s0".into(), "s1".into(), "s2".into()],
        }]);
        let init = world.make_initial_state();
        let mut ops = Operators::new();
        ops.push(Operator {
            name: "s0-to-s1".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 1,
        });
        ops.push(Operator {
            name: "s1-to-s2".into(),
            precond: vec![Fact::new(VarId::from(0), 1)],
            effects: vec![Fact::new(VarId::from(0), 2)],
            cost: 1,
        });
        let hard = Fact::new(VarId::from(0), 2);
        let task = Task::new(world, init, ops, vec![hard], vec![], Mutexes::new(), vec![]).unwrap();

        let mut config = Config {
            bound: Some(1),
            max_bound: Some(3),
            step: 3.0,
            ..Config::default()
        };
        config.prune = false; // isolate the bound ladder from MSGS-pruning interaction

        let driver = IteratedDriver::new(&task, Evaluator::Blind(Blind), config);
        let report = driver.run();

        assert_eq!(report.tasks.len(), 1);
        assert!(report.tasks[0].solvable, "the second round (bound raised to 3) must reach the goal");
    }

    #[test]
    fn bound_ladder_gives_up_once_max_bound_is_exhausted() {
        // Same shape as above, but `max_bound` is pinned below what the goal needs: the ladder
        // must stop raising once it hits the cap and report the task unsolved rather than loop.
        let world = World::new(vec![Variable {
            name: "stage".into(),
            domain: vec!["s0".into(), "s1".into(), "s2".into()],
        }]);
        let init = world.make_initial_state();
        let mut ops = Operators::new();
        ops.push(Operator {
            name: "s0-to-s1".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 1,
        });
        ops.push(Operator {
            name: "s1-to-s2".into(),
            precond: vec![Fact::new(VarId::from(0), 1)],
            effects: vec![Fact::new(VarId::from(0), 2)],
            cost: 1,
        });
        let hard = Fact::new(VarId::from(0), 2);
        let task = Task::new(world, init, ops, vec![hard], vec![], Mutexes::new(), vec![]).unwrap();

        let mut config = Config {
            bound: Some(1),
            max_bound: Some(2),
            step: 3.0,
            ..Config::default()
        };
        config.prune = false;

        let driver = IteratedDriver::new(&task, Evaluator::Blind(Blind), config);
        let report = driver.run();

        assert_eq!(report.tasks.len(), 1);
        assert!(!report.tasks[0].solvable, "bound 2 still prunes the goal-reaching step; the ladder must not exceed max_bound");
    }

    #[test]
    fn solvability_propagates_upward_without_rerunning_the_upper_task() {
        // `loc=b` is a *hard* goal here, so disabling `a-to-b` genuinely makes `upper`
        // unsolvable on its own; its solvability must instead come from `lower`, which keeps
        // the operator enabled, via step 2's upward propagation.
        let world = World::new(vec![
            Variable {
                name: "loc".into(),
                domain: vec!["a".into(), "b".into()],
            },
            Variable {
                name: "flag".into(),
                domain: vec!["off".into(), "on".into()],
            },
        ]);
        let init = world.make_initial_state();
        let mut ops = Operators::new();
        ops.push(Operator {
            name: "a-to-b".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 1,
        });
        ops.push(Operator {
            name: "set-flag".into(),
            precond: vec![],
            effects: vec![Fact::new(VarId::from(1), 1)],
            cost: 1,
        });
        let hard = Fact::new(VarId::from(0), 1);
        let soft = Fact::new(VarId::from(1), 1);
        let lower = RelaxedTaskDef {
            name: "lower".into(),
            lower_cover: vec![],
            upper_cover: vec!["upper".into()],
            init_override: vec![],
            disabled_operators: vec![],
        };
        let upper = RelaxedTaskDef {
            name: "upper".into(),
            lower_cover: vec!["lower".into()],
            upper_cover: vec![],
            init_override: vec![],
            // would make the hard goal unreachable on its own; propagation must pre-empt its
            // own (losing) search.
            disabled_operators: vec!["a-to-b".into()],
        };
        let task = Task::new(world, init, ops, vec![hard], vec![soft], Mutexes::new(), vec![lower, upper]).unwrap();

        let driver = IteratedDriver::new(&task, Evaluator::Blind(Blind), Config::default());
        let report = driver.run();

        let lower_result = report.tasks.iter().find(|t| t.name == "lower").unwrap();
        assert!(lower_result.solvable);
        assert!(lower_result.mugs.is_empty(), "the flag is reachable alongside the hard goal");

        let upper_result = report.tasks.iter().find(|t| t.name == "upper").unwrap();
        assert!(upper_result.solvable, "upper must inherit solvability from its lower-cover");
        assert!(upper_result.mugs.is_empty());
    }
}
