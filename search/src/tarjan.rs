//! Tarjan DFS search driver with dead-end-component conflict learning: an explicit call-stack DFS
//! (`Vec<Frame>`) replacing native recursion so a deep planning graph cannot blow the Rust call
//! stack.
//!
//! Standard recursive Tarjan SCC discovery, specialized two ways:
//! - entering a node for the first time runs it through the same evaluator/pruning composition
//!   as the best-first driver, marking it a dead end immediately rather than ever stacking
//!   it;
//! - when a strongly connected component finishes and none of its members has a live edge
//!   leaving the component, the whole component is a dead end; if the evaluator exposes a
//!   `refine` callback, it is taught the component's states and the already-resolved neighbors
//!   bordering it, in the hope it recognizes similar states as dead ends without search in the
//!   future.

use crate::registry::{NodeStatus, StateId, StateRegistry};
use crate::report::{DriverReport, SearchStats, Termination};
use crate::Config;
use mugs_model::eval::{DeadEndComponent, Estimate, Evaluator, EvaluatorOps, RecognizedNeighbor};
use mugs_model::msgs::MsgsCollection;
use mugs_model::state::{Fact, OpId};
use mugs_model::{State, Task};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

struct Frame {
    id: StateId,
    g: u32,
    ops: Vec<OpId>,
    next: usize,
}

pub struct TarjanDriver<'t> {
    task: &'t Task,
    config: Config,
    evaluator: Evaluator,
    registry: StateRegistry,
    msgs: MsgsCollection<StateId>,
    stats: SearchStats,
    deadline: Option<Instant>,
    /// Polled alongside the deadline; see `BestFirstDriver::with_interrupt`.
    interrupt: Option<Arc<AtomicBool>>,
    counter: u32,
    tarjan_stack: Vec<StateId>,
    call_stack: Vec<Frame>,
    /// Successors found dead while a given node was the active frame, pending SCC completion.
    dead_neighbors: HashMap<StateId, Vec<RecognizedNeighbor>>,
    refinement_enabled: bool,
    /// Invoked with each newly added MSGS, in `config.anytime` mode only (see
    /// `BestFirstDriver::with_anytime_sink`).
    anytime_sink: Option<Box<dyn FnMut(mugs_collections::GoalSubset)>>,
}

impl<'t> TarjanDriver<'t> {
    pub fn new(task: &'t Task, evaluator: Evaluator, config: Config) -> Self {
        let msgs = MsgsCollection::new(task.hard_goals.clone(), task.soft_goals.clone());
        let refinement_enabled = evaluator.supports_refine();
        TarjanDriver {
            task,
            config,
            evaluator,
            registry: StateRegistry::new(),
            msgs,
            stats: SearchStats::default(),
            deadline: None,
            interrupt: None,
            counter: 0,
            tarjan_stack: Vec::new(),
            call_stack: Vec::new(),
            dead_neighbors: HashMap::new(),
            refinement_enabled,
            anytime_sink: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Polls `flag` at the same cadence as the deadline; see `BestFirstDriver::with_interrupt`.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Registers a callback fired with every newly added MSGS when `config.anytime` is set.
    pub fn with_anytime_sink(mut self, sink: impl FnMut(mugs_collections::GoalSubset) + 'static) -> Self {
        self.anytime_sink = Some(Box::new(sink));
        self
    }

    /// Pre-populates the MSGS antichain before the root is entered, used by the iterated
    /// relaxation driver to seed a task's search from its lower-cover neighbors' MSGS.
    pub fn seed_msgs(mut self, subsets: impl IntoIterator<Item = mugs_collections::GoalSubset>) -> Self {
        for s in subsets {
            self.msgs.add(s);
        }
        self
    }

    fn per_fact_cost<'e>(estimates: &'e [Estimate], goal_facts: &'e [Fact]) -> impl Fn(Fact) -> Estimate + 'e {
        move |f: Fact| goal_facts.iter().position(|&gf| gf == f).and_then(|i| estimates.get(i).copied())
    }

    /// Computes the evaluator estimate at `id` and runs the pruning composition.
    ///
    /// Returns `(dead, contributed)`: `dead` marks the node dead without ever assigning it a
    /// Tarjan index; `contributed` reports whether reaching this state grew the MSGS collection
    /// (a new soft-goal subset became reachable). A contributing state is never part of a
    /// dead-end component even with zero outgoing edges — it already paid for itself.
    fn evaluate_and_prune(&mut self, id: StateId, g: u32, goal_facts: &[Fact]) -> (bool, bool) {
        let state = self.registry.state(id).clone();
        let estimates = self.evaluator.estimate(&state, g, goal_facts);
        let dead = if self.config.prune {
            estimates.iter().any(|e| e.is_none()) || {
                let budget_remaining = self.config.bound.map(|b| b.saturating_sub(g));
                self.msgs
                    .prune(&state, id, Self::per_fact_cost(&estimates, goal_facts), budget_remaining)
            }
        } else {
            self.msgs.track(&state, id);
            false
        };
        if dead {
            self.registry.set_status(id, NodeStatus::Dead);
            self.stats.pruned += 1;
        }
        // `prune` calls `track` internally whenever the state is not dead; a just-reset counter
        // means that call's `track` just recorded a brand-new soft-goal subset.
        let contributed = !dead && self.msgs.states_since_last_addition() == 0;
        if contributed && self.config.anytime {
            if let Some(added) = self.msgs.last_added() {
                tracing::info!(?added, "anytime MSGS");
                if let Some(sink) = self.anytime_sink.as_mut() {
                    sink(added);
                }
            }
        }
        (dead, contributed)
    }

    /// Enters `id` for the first time: assigns its Tarjan index/lowlink, pushes it on both
    /// stacks, and orders its applicable operators with preferred operators first.
    fn enter(&mut self, id: StateId, g: u32, contributed: bool) {
        self.registry.node_mut(id).tarjan_index = Some(self.counter);
        self.registry.node_mut(id).tarjan_lowlink = Some(self.counter);
        self.counter += 1;
        self.registry.node_mut(id).on_stack = true;
        self.tarjan_stack.push(id);
        if contributed {
            self.registry.mark_live(id);
        }

        let state = self.registry.state(id).clone();
        let preferred = self.evaluator.preferred_operators(&state, &self.task.operators);
        let mut ops: Vec<OpId> = self.task.operators.applicable_in(&state).collect();
        ops.sort_by_key(|op| !preferred.contains(op));
        self.stats.expansions += 1;
        self.call_stack.push(Frame { id, g, ops, next: 0 });
    }

    /// SCC completion for the node on top of the call stack.
    fn finish(&mut self) {
        let frame = self.call_stack.pop().expect("finish called with an empty call stack");
        let id = frame.id;
        let index = self.registry.node(id).tarjan_index.expect("finished node was never entered");
        let lowlink = self.registry.node(id).tarjan_lowlink.expect("finished node was never entered");

        if index == lowlink {
            let mut members = Vec::new();
            loop {
                let top = self.tarjan_stack.pop().expect("SCC root must be on the Tarjan stack");
                self.registry.node_mut(top).on_stack = false;
                members.push(top);
                if top == id {
                    break;
                }
            }
            let closed = !members.iter().any(|&m| self.registry.node(m).has_live_successor);
            if closed {
                self.close_dead_component(&members);
            } else {
                for &m in &members {
                    self.registry.set_status(m, NodeStatus::Closed);
                }
            }
        }

        if let Some(parent) = self.call_stack.last() {
            let parent_id = parent.id;
            if lowlink < self.registry.node(parent_id).tarjan_lowlink.unwrap_or(u32::MAX) {
                self.registry.node_mut(parent_id).tarjan_lowlink = Some(lowlink);
            }
            // `id` escaped into an ancestor's still-open component: its liveness is already
            // folded into that component's own aggregate, not a fresh edge out of `parent`.
            if !self.registry.node(id).on_stack && !matches!(self.registry.node(id).status, NodeStatus::Dead) {
                self.registry.mark_live(parent_id);
            }
        }
    }

    fn close_dead_component(&mut self, members: &[StateId]) {
        let mut raw_neighbors = Vec::new();
        for &m in members {
            if let Some(list) = self.dead_neighbors.remove(&m) {
                raw_neighbors.extend(list);
            }
            self.registry.set_status(m, NodeStatus::Dead);
        }

        let neighbors = if self.config.unique_neighbors {
            let mut best: HashMap<State, u32> = HashMap::new();
            for rn in raw_neighbors {
                best.entry(rn.state).and_modify(|c| *c = (*c).min(rn.cost)).or_insert(rn.cost);
            }
            best.into_iter().map(|(state, cost)| RecognizedNeighbor { state, cost }).collect()
        } else {
            raw_neighbors
        };

        let component = DeadEndComponent {
            states: members.iter().map(|&m| self.registry.state(m).clone()).collect(),
        };

        if self.refinement_enabled {
            self.stats.refinements += 1;
            let learned = self.evaluator.refine(&component, &neighbors);
            if !learned {
                self.refinement_enabled = false;
            }
        }
    }

    pub fn run(mut self) -> DriverReport {
        let goal_facts = self.task.all_goal_facts();
        let root_state = self.task.initial_state.clone();
        let root = self.registry.insert_root(root_state);

        let (dead, contributed) = self.evaluate_and_prune(root, 0, &goal_facts);
        let termination = if dead {
            Termination::OpenExhausted
        } else {
            self.enter(root, 0, contributed);
            self.drive(&goal_facts)
        };

        DriverReport {
            termination,
            plan: None,
            solvable: self.msgs.hard_ever_satisfied(),
            msgs: self.msgs.iter().copied().collect(),
            mugs: self.msgs.get_mugs(),
            stats: self.stats,
        }
    }

    fn drive(&mut self, goal_facts: &[Fact]) -> Termination {
        let poll_every = crate::tuning::DEADLINE_POLL_EVERY_N.get().max(1);
        let mut since_poll = 0u32;

        while !self.call_stack.is_empty() {
            since_poll += 1;
            if since_poll >= poll_every {
                since_poll = 0;
                let timed_out = self.deadline.map_or(false, |d| Instant::now() >= d);
                let interrupted = self.interrupt.as_ref().map_or(false, |f| f.load(AtomicOrdering::Relaxed));
                if timed_out || interrupted {
                    return Termination::OutOfResource;
                }
            }

            let frame = self.call_stack.last().expect("loop guard ensures non-empty");
            if frame.next >= frame.ops.len() {
                self.finish();
                continue;
            }

            let frame_id = frame.id;
            let g = frame.g;
            let op = frame.ops[frame.next];
            self.call_stack.last_mut().unwrap().next += 1;

            let gp = g.saturating_add(self.task.operators.cost(op));
            if self.config.bound.map_or(false, |b| gp >= b) {
                continue;
            }

            let parent_state = self.registry.state(frame_id).clone();
            let child_state = parent_state.successor(self.task.operators.effects(op));
            let (child_id, is_new) = self.registry.get_or_create(child_state, frame_id, op, gp);

            if is_new {
                let (dead, contributed) = self.evaluate_and_prune(child_id, gp, goal_facts);
                if dead {
                    self.record_dead_neighbor(frame_id, child_id, op);
                } else {
                    self.enter(child_id, gp, contributed);
                }
                continue;
            }

            if matches!(self.registry.node(child_id).status, NodeStatus::Dead) {
                self.record_dead_neighbor(frame_id, child_id, op);
                continue;
            }

            if self.registry.node(child_id).on_stack {
                let child_index = self.registry.node(child_id).tarjan_index.expect("on-stack node has an index");
                if child_index < self.registry.node(frame_id).tarjan_lowlink.unwrap_or(u32::MAX) {
                    self.registry.node_mut(frame_id).tarjan_lowlink = Some(child_index);
                }
            } else {
                // already resolved in an earlier, separate SCC: a genuine escape for `frame_id`.
                self.registry.mark_live(frame_id);
            }
        }

        Termination::OpenExhausted
    }

    fn record_dead_neighbor(&mut self, from: StateId, dead_child: StateId, op: OpId) {
        let cost = self.task.operators.cost(op);
        let state = self.registry.state(dead_child).clone();
        self.dead_neighbors.entry(from).or_default().push(RecognizedNeighbor { state, cost });
    }
}
