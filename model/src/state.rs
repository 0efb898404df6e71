use mugs_collections::create_ref_type;
use std::collections::HashMap;
use std::fmt;

create_ref_type!(VarId);
create_ref_type!(OpId);

/// A finite-domain variable: a name (for display only) and the number of values it may take.
///
/// Values are dense integers `0..domain.len()`; `domain` carries the display label of each one.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub domain: Vec<String>,
}

impl Variable {
    pub fn domain_size(&self) -> u32 {
        self.domain.len() as u32
    }
}

/// The table of declared variables a task is defined over.
///
/// Mirrors the role of the reference planner's `World`: it owns the conversion between facts
/// and the dense numeric ids the rest of the engine works with.
#[derive(Debug, Clone, Default)]
pub struct World {
    variables: Vec<Variable>,
}

impl World {
    pub fn new(variables: Vec<Variable>) -> Self {
        World { variables }
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variable(&self, v: VarId) -> &Variable {
        &self.variables[v]
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.variables.len()).map(VarId::from)
    }

    pub fn make_initial_state(&self) -> State {
        State {
            values: vec![0; self.variables.len()],
        }
    }

    pub fn fact_name(&self, fact: Fact) -> String {
        let var = self.variable(fact.var);
        match var.domain.get(fact.val as usize) {
            Some(label) => format!("{}={}", var.name, label),
            None => format!("{}={}", var.name, fact.val),
        }
    }
}

/// A variable/value pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fact {
    pub var: VarId,
    pub val: u32,
}

impl Fact {
    pub fn new(var: VarId, val: u32) -> Self {
        Fact { var, val }
    }
}

/// A total assignment of every declared variable to one of its values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    values: Vec<u32>,
}

impl State {
    pub fn num_variables(&self) -> usize {
        self.values.len()
    }

    pub fn value_of(&self, var: VarId) -> u32 {
        self.values[var]
    }

    pub fn set(&mut self, fact: Fact) {
        self.values[fact.var] = fact.val;
    }

    pub fn entails(&self, fact: Fact) -> bool {
        self.value_of(fact.var) == fact.val
    }

    pub fn entails_all(&self, facts: &[Fact]) -> bool {
        facts.iter().all(|&f| self.entails(f))
    }

    pub fn apply(&mut self, effects: &[Fact]) {
        effects.iter().for_each(|&f| self.set(f));
    }

    /// A state derived from `self` with `effects` applied, leaving `self` untouched.
    pub fn successor(&self, effects: &[Fact]) -> State {
        let mut next = self.clone();
        next.apply(effects);
        next
    }

    /// The facts currently holding in this state: one `(var, value)` pair per declared variable.
    pub fn facts(&self) -> impl Iterator<Item = Fact> + '_ {
        self.values.iter().enumerate().map(|(i, &v)| Fact::new(VarId::from(i), v))
    }
}

/// A grounded planning operator: a conjunctive precondition, a list of effects applied in
/// order, and a non-negative cost.
#[derive(Debug, Clone)]
pub struct Operator {
    pub name: String,
    pub precond: Vec<Fact>,
    pub effects: Vec<Fact>,
    pub cost: u32,
}

impl Operator {
    pub fn pre(&self) -> &[Fact] {
        &self.precond
    }

    pub fn eff(&self) -> &[Fact] {
        &self.effects
    }
}

/// The dense registry of grounded operators, with per-fact indexes for successor generation
/// and for feeding a relaxed-heuristic fixpoint (mirroring the reference planner's
/// `classical::state::Operators`, generalized from boolean literals to multi-valued facts).
#[derive(Debug, Clone, Default)]
pub struct Operators {
    all: Vec<Operator>,
    /// Operators that have `fact` as (one of) their preconditions.
    watchers: HashMap<Fact, Vec<OpId>>,
    /// Operators that have `fact` as (one of) their effects.
    achievers: HashMap<Fact, Vec<OpId>>,
}

impl Operators {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, op: Operator) -> OpId {
        let id: OpId = self.all.len().into();
        for &fact in op.pre() {
            self.watchers.entry(fact).or_default().push(id);
        }
        for &fact in op.eff() {
            self.achievers.entry(fact).or_default().push(id);
        }
        self.all.push(op);
        id
    }

    pub fn get(&self, op: OpId) -> &Operator {
        &self.all[op]
    }

    pub fn preconditions(&self, op: OpId) -> &[Fact] {
        self.all[op].pre()
    }

    pub fn effects(&self, op: OpId) -> &[Fact] {
        self.all[op].eff()
    }

    pub fn cost(&self, op: OpId) -> u32 {
        self.all[op].cost
    }

    pub fn dependent_on(&self, fact: Fact) -> &[OpId] {
        static EMPTY: Vec<OpId> = Vec::new();
        self.watchers.get(&fact).unwrap_or(&EMPTY)
    }

    pub fn achievers_of(&self, fact: Fact) -> &[OpId] {
        static EMPTY: Vec<OpId> = Vec::new();
        self.achievers.get(&fact).unwrap_or(&EMPTY)
    }

    pub fn iter(&self) -> impl Iterator<Item = OpId> {
        (0..self.all.len()).map(OpId::from)
    }

    pub fn size(&self) -> usize {
        self.all.len()
    }

    /// Operators whose precondition is already entailed by `state`.
    pub fn applicable_in<'a>(&'a self, state: &'a State) -> impl Iterator<Item = OpId> + 'a {
        self.iter().filter(move |&op| state.entails_all(self.preconditions(op)))
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(var{:?}={})", self.var, self.val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_operators() -> (World, Operators) {
        let world = World::new(vec![
            Variable {
                name: "loc".into(),
                domain: vec!["a".into(), "b".into()],
            },
            Variable {
                name: "has-key".into(),
                domain: vec!["no".into(), "yes".into()],
            },
        ]);
        let mut ops = Operators::new();
        let move_a_b = Operator {
            name: "move-a-b".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 1,
        };
        let pick_key = Operator {
            name: "pick-key".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(1), 1)],
            cost: 1,
        };
        ops.push(move_a_b);
        ops.push(pick_key);
        (world, ops)
    }

    #[test]
    fn applicable_operators_respect_preconditions() {
        let (world, ops) = toy_operators();
        let init = world.make_initial_state();
        let applicable: Vec<_> = ops.applicable_in(&init).collect();
        assert_eq!(applicable.len(), 2);

        let after_move = init.successor(ops.effects(applicable[0]));
        let still_applicable: Vec<_> = ops.applicable_in(&after_move).collect();
        // both operators require loc=a, so after moving away neither remains applicable
        assert_eq!(still_applicable.len(), 0);
    }

    #[test]
    fn watchers_and_achievers_are_indexed() {
        let (_world, ops) = toy_operators();
        let at_a = Fact::new(VarId::from(0), 0);
        let at_b = Fact::new(VarId::from(0), 1);
        assert_eq!(ops.dependent_on(at_a).len(), 2);
        assert_eq!(ops.achievers_of(at_b).len(), 1);
        assert_eq!(ops.achievers_of(at_a).len(), 0);
    }
}
