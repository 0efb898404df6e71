//! The evaluator contract and the reference evaluators that make the
//! rest of the engine runnable without an external heuristic plugin.
//!
//! Richer evaluators (critical-path `h^C`, Cartesian abstractions, potential heuristics) stay
//! external collaborators; they would add further variants to the [`Evaluator`] tagged union
//! without touching any call site, since every call site only ever goes through [`EvaluatorOps`].

use crate::state::{Fact, OpId, Operators, State};
use mugs_collections::RefStore;
use std::collections::HashMap;
use std::rc::Rc;

/// A non-negative lower-bound cost estimate, or `None` standing in for `∞`.
pub type Estimate = Option<u32>;

/// A dead-end component discovered by the Tarjan driver, handed to a refiner.
#[derive(Debug, Clone)]
pub struct DeadEndComponent {
    pub states: Vec<State>,
}

/// A successor outside a dead-end component that is already recognized as dead, offered to the
/// refiner alongside its cost contribution.
#[derive(Debug, Clone)]
pub struct RecognizedNeighbor {
    pub state: State,
    pub cost: u32,
}

/// The per-fact estimator consumed by pruning and ordering.
///
/// Implementations must be consistent (monotonic along edges) for pruning to be admissible; the
/// contract only specifies what pruning *does* with the values, not how to compute them.
pub trait EvaluatorOps {
    /// Estimated cost-to-achieve of each of `facts`, given the current state and path cost `g`.
    fn estimate(&self, state: &State, g: u32, facts: &[Fact]) -> Vec<Estimate>;

    /// Operators the evaluator recommends trying first; empty if it has no preference.
    fn preferred_operators(&self, _state: &State, _ops: &Operators) -> Vec<OpId> {
        Vec::new()
    }

    /// Whether this evaluator can learn new dead-end recognitions via [`Self::refine`].
    fn supports_refine(&self) -> bool {
        false
    }

    /// Teaches the evaluator to recognize `component` (and similar states) as dead ends, using
    /// `neighbors` as evidence. Returns `true` if the internal model actually changed.
    fn refine(&mut self, _component: &DeadEndComponent, _neighbors: &[RecognizedNeighbor]) -> bool {
        false
    }
}

/// Every unsatisfied fact costs `1`, every satisfied fact costs `0`.
///
/// No dead-end predicate beyond the literal estimate (never `∞`), no refine capability. Useful
/// as a trivial evaluator for correctness tests that do not exercise pruning strength.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blind;

impl EvaluatorOps for Blind {
    fn estimate(&self, state: &State, _g: u32, facts: &[Fact]) -> Vec<Estimate> {
        facts.iter().map(|&f| Some(if state.entails(f) { 0 } else { 1 })).collect()
    }
}

/// [`Blind`] plus a conflict-learning `refine`: remembers every state handed to it in a
/// [`DeadEndComponent`] and estimates `∞` for any fact once the current state is one it has
/// learned is dead.
///
/// Neither `Blind` nor `HMax` supports refinement, which leaves the Tarjan driver's learning step
/// permanently unreachable from outside the `search` crate. This evaluator exists so
/// that contract has a reference implementation driving it end to end.
#[derive(Debug, Clone, Default)]
pub struct LearningBlind {
    dead_states: std::collections::HashSet<State>,
}

impl LearningBlind {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn learned_count(&self) -> usize {
        self.dead_states.len()
    }
}

impl EvaluatorOps for LearningBlind {
    fn estimate(&self, state: &State, _g: u32, facts: &[Fact]) -> Vec<Estimate> {
        if self.dead_states.contains(state) {
            return vec![None; facts.len()];
        }
        facts.iter().map(|&f| Some(if state.entails(f) { 0 } else { 1 })).collect()
    }

    fn supports_refine(&self) -> bool {
        true
    }

    fn refine(&mut self, component: &DeadEndComponent, _neighbors: &[RecognizedNeighbor]) -> bool {
        let mut changed = false;
        for s in &component.states {
            changed |= self.dead_states.insert(s.clone());
        }
        changed
    }
}

/// A relaxed-planning-graph fixpoint directly generalizing the reference planner's `hadd`:
/// literal cost `0` for facts already true in the state, then repeatedly relaxing
/// `cost(op) = max over preconditions of cost(fact)` (h-max takes the max where h-add takes the
/// sum) and `cost(fact) = min over achieving ops of (cost(op) + op.cost)` until no value
/// decreases. Facts never reached keep cost `∞`.
///
/// Exposes a dead-end predicate (any hard goal estimating to `∞`) but no refine capability, so it
/// is never paired with the Tarjan driver's learning step.
#[derive(Clone)]
pub struct HMax {
    operators: Rc<Operators>,
}

impl HMax {
    pub fn new(operators: Rc<Operators>) -> Self {
        HMax { operators }
    }

    /// The h-max fixpoint from `state`: a cost for every fact reached by the relaxed
    /// (delete-relaxation-free, since facts here are already multi-valued "assignments") graph.
    fn fact_costs(&self, state: &State) -> HashMap<Fact, u32> {
        let ops = &self.operators;
        let mut op_cost: RefStore<OpId, Option<u32>> = RefStore::initialized(ops.size(), None);
        let mut update: RefStore<OpId, bool> = RefStore::initialized(ops.size(), false);
        let mut fact_cost: HashMap<Fact, u32> = HashMap::new();

        for op in ops.iter() {
            if ops.preconditions(op).is_empty() {
                update[op] = true;
            }
        }
        for fact in state.facts() {
            fact_cost.insert(fact, 0);
            for &op in ops.dependent_on(fact) {
                update[op] = true;
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for op in ops.iter() {
                if !update[op] {
                    continue;
                }
                update[op] = false;
                let precond = ops.preconditions(op);
                let c = precond.iter().try_fold(0u32, |acc, &f| fact_cost.get(&f).map(|&c| acc.max(c)));
                let Some(c) = c else { continue };
                let improves = op_cost[op].map_or(true, |old| c < old);
                if !improves {
                    continue;
                }
                op_cost[op] = Some(c);
                let total = c + ops.cost(op);
                for &effect in ops.effects(op) {
                    let better = fact_cost.get(&effect).map_or(true, |&old| total < old);
                    if better {
                        fact_cost.insert(effect, total);
                        changed = true;
                        for &dependent in ops.dependent_on(effect) {
                            update[dependent] = true;
                        }
                    }
                }
            }
        }
        fact_cost
    }
}

impl EvaluatorOps for HMax {
    fn estimate(&self, state: &State, _g: u32, facts: &[Fact]) -> Vec<Estimate> {
        let costs = self.fact_costs(state);
        facts.iter().map(|&f| costs.get(&f).copied()).collect()
    }
}

/// Tagged-union dispatch over the evaluator contract, keeping the hot path free of a vtable while
/// leaving room for external variants (`Potential`, `Cartesian`, `Cegar`, `HC`) to be added later
/// without changing any call site.
#[derive(Clone)]
pub enum Evaluator {
    Blind(Blind),
    HMax(HMax),
    LearningBlind(LearningBlind),
}

impl EvaluatorOps for Evaluator {
    fn estimate(&self, state: &State, g: u32, facts: &[Fact]) -> Vec<Estimate> {
        match self {
            Evaluator::Blind(e) => e.estimate(state, g, facts),
            Evaluator::HMax(e) => e.estimate(state, g, facts),
            Evaluator::LearningBlind(e) => e.estimate(state, g, facts),
        }
    }

    fn preferred_operators(&self, state: &State, ops: &Operators) -> Vec<OpId> {
        match self {
            Evaluator::Blind(e) => e.preferred_operators(state, ops),
            Evaluator::HMax(e) => e.preferred_operators(state, ops),
            Evaluator::LearningBlind(e) => e.preferred_operators(state, ops),
        }
    }

    fn supports_refine(&self) -> bool {
        match self {
            Evaluator::Blind(e) => e.supports_refine(),
            Evaluator::HMax(e) => e.supports_refine(),
            Evaluator::LearningBlind(e) => e.supports_refine(),
        }
    }

    fn refine(&mut self, component: &DeadEndComponent, neighbors: &[RecognizedNeighbor]) -> bool {
        match self {
            Evaluator::Blind(e) => e.refine(component, neighbors),
            Evaluator::HMax(e) => e.refine(component, neighbors),
            Evaluator::LearningBlind(e) => e.refine(component, neighbors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Operator, VarId, Variable, World};

    fn two_step_world() -> (World, Operators) {
        let world = World::new(vec![
            Variable {
                name: "loc".into(),
                domain: vec!["a".into(), "b".into(), "c".into()],
            },
            Variable {
                name: "flag".into(),
                domain: vec!["off".into(), "on".into()],
            },
        ]);
        let mut ops = Operators::new();
        ops.push(Operator {
            name: "a-to-b".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 2,
        });
        ops.push(Operator {
            name: "b-to-c".into(),
            precond: vec![Fact::new(VarId::from(0), 1)],
            effects: vec![Fact::new(VarId::from(0), 2)],
            cost: 3,
        });
        (world, ops)
    }

    #[test]
    fn blind_costs_zero_or_one() {
        let (world, _ops) = two_step_world();
        let state = world.make_initial_state();
        let b = Blind;
        let facts = vec![Fact::new(VarId::from(0), 0), Fact::new(VarId::from(0), 1)];
        let est = b.estimate(&state, 0, &facts);
        assert_eq!(est, vec![Some(0), Some(1)]);
    }

    #[test]
    fn hmax_propagates_additive_costs_along_a_chain() {
        let (world, ops) = two_step_world();
        let state = world.make_initial_state();
        let h = HMax::new(Rc::new(ops));
        let facts = vec![Fact::new(VarId::from(0), 1), Fact::new(VarId::from(0), 2)];
        let est = h.estimate(&state, 0, &facts);
        assert_eq!(est, vec![Some(2), Some(5)]);
    }

    #[test]
    fn hmax_reports_infinite_for_unreachable_fact() {
        let (world, ops) = two_step_world();
        let state = world.make_initial_state();
        let h = HMax::new(Rc::new(ops));
        let unreachable = Fact::new(VarId::from(1), 1); // no operator ever sets `flag`
        let est = h.estimate(&state, 0, std::slice::from_ref(&unreachable));
        assert_eq!(est, vec![None]);
    }

    #[test]
    fn learning_blind_estimates_infinite_after_refine_on_its_component() {
        let (world, _ops) = two_step_world();
        let dead_state = world.make_initial_state();
        let mut e = LearningBlind::new();
        let facts = vec![Fact::new(VarId::from(0), 0)];

        assert_eq!(e.estimate(&dead_state, 0, &facts), vec![Some(0)]); // not yet learned: behaves like Blind

        let component = DeadEndComponent {
            states: vec![dead_state.clone()],
        };
        assert!(e.refine(&component, &[]));
        assert_eq!(e.learned_count(), 1);
        assert_eq!(e.estimate(&dead_state, 0, &facts), vec![None]);

        // re-learning the same component is a no-op, reported via the `bool` return
        assert!(!e.refine(&component, &[]));
    }
}
