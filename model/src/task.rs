//! The planning task: variables, grounded operators, goal partition, optional mutexes and the
//! relaxed-task lattice declarations consumed by the iterated-relaxation driver.

use crate::errors::{PlannerError, PlannerResult};
use crate::state::{Fact, Operators, State, World};
use std::collections::HashSet;

/// A symmetric pairwise-conflict relation over facts.
///
/// The core never special-cases mutexes itself (per the evaluator-contract design): this table
/// exists purely so an evaluator can be handed it at construction time to recognize
/// immediately-unreachable pairs.
#[derive(Debug, Clone, Default)]
pub struct Mutexes {
    pairs: HashSet<(Fact, Fact)>,
}

fn ordered(a: Fact, b: Fact) -> (Fact, Fact) {
    if (a.var.to_u32(), a.val) <= (b.var.to_u32(), b.val) {
        (a, b)
    } else {
        (b, a)
    }
}

impl Mutexes {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, a: Fact, b: Fact) {
        self.pairs.insert(ordered(a, b));
    }

    pub fn is_mutex(&self, a: Fact, b: Fact) -> bool {
        self.pairs.contains(&ordered(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Declarative record of one node in the relaxed-task lattice.
///
/// This is the static, load-time description of a relaxation: a name, its neighbors in the
/// partial order, a partial override of the initial state, and the names of operators disabled
/// by the relaxation. The runtime bookkeeping the iterated driver layers on top of this
/// (accumulated MSGS, solvable flag) lives in the `search` crate's own `TaskRuntime`, which is
/// the only component that knows about live `StateId`s. `TaskRuntime` does *not* carry a frontier
/// of `(state, operator)` pairs disabled by this relaxation — each relaxed task is instead solved
/// from scratch as its own freshly built `Task`/`StateRegistry` (see `IteratedDriver::resolve`),
/// not resumed incrementally from a parent task's partial search; see `DESIGN.md`'s Open Question
/// on this for why.
#[derive(Debug, Clone, Default)]
pub struct RelaxedTaskDef {
    pub name: String,
    pub lower_cover: Vec<String>,
    pub upper_cover: Vec<String>,
    pub init_override: Vec<Fact>,
    pub disabled_operators: Vec<String>,
}

/// A fully loaded, validated planning task.
#[derive(Debug, Clone)]
pub struct Task {
    pub world: World,
    pub initial_state: State,
    pub operators: Operators,
    pub hard_goals: Vec<Fact>,
    pub soft_goals: Vec<Fact>,
    pub mutexes: Mutexes,
    pub relaxed_tasks: Vec<RelaxedTaskDef>,
}

impl Task {
    /// Builds and validates a task. See [`Task`] field docs for what each part represents.
    ///
    /// # Errors
    /// Returns [`PlannerError::InputError`] if:
    /// - `hard_goals` and `soft_goals` are not disjoint,
    /// - `soft_goals` exceeds the 64-bit [`mugs_collections::GoalSubset`] width cap,
    /// - any operator's precondition or effect references a variable/value outside `world`,
    /// - a relaxed-task's lower/upper cover names a task absent from `relaxed_tasks`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world: World,
        initial_state: State,
        operators: Operators,
        hard_goals: Vec<Fact>,
        soft_goals: Vec<Fact>,
        mutexes: Mutexes,
        relaxed_tasks: Vec<RelaxedTaskDef>,
    ) -> PlannerResult<Task> {
        let hard_set: HashSet<Fact> = hard_goals.iter().copied().collect();
        let soft_set: HashSet<Fact> = soft_goals.iter().copied().collect();
        if !hard_set.is_disjoint(&soft_set) {
            return Err(PlannerError::InputError(
                "hard and soft goal lists are not disjoint".to_string(),
            ));
        }
        if soft_goals.len() > mugs_collections::GoalSubset::MAX_WIDTH as usize {
            return Err(PlannerError::InputError(format!(
                "{} soft goals exceed the {}-bit goal-subset width cap",
                soft_goals.len(),
                mugs_collections::GoalSubset::MAX_WIDTH
            )));
        }

        let check_fact = |f: Fact| -> PlannerResult<()> {
            let var_idx: usize = f.var.into();
            if var_idx >= world.num_variables() {
                return Err(PlannerError::InputError(format!("fact references undeclared variable {var_idx}")));
            }
            if f.val >= world.variable(f.var).domain_size() {
                return Err(PlannerError::InputError(format!(
                    "fact value {} out of domain for variable {}",
                    f.val, var_idx
                )));
            }
            Ok(())
        };
        for op in operators.iter() {
            for &f in operators.preconditions(op) {
                check_fact(f)?;
            }
            for &f in operators.effects(op) {
                check_fact(f)?;
            }
        }
        for &f in hard_goals.iter().chain(soft_goals.iter()) {
            check_fact(f)?;
        }

        let declared: HashSet<&str> = relaxed_tasks.iter().map(|t| t.name.as_str()).collect();
        for t in &relaxed_tasks {
            for name in t.lower_cover.iter().chain(t.upper_cover.iter()) {
                if !declared.contains(name.as_str()) {
                    return Err(PlannerError::InputError(format!(
                        "relaxed task '{}' references undeclared neighbor '{}'",
                        t.name, name
                    )));
                }
            }
        }

        tracing::debug!(
            num_vars = world.num_variables(),
            num_ops = operators.size(),
            num_hard = hard_goals.len(),
            num_soft = soft_goals.len(),
            "task loaded"
        );

        Ok(Task {
            world,
            initial_state,
            operators,
            hard_goals,
            soft_goals,
            mutexes,
            relaxed_tasks,
        })
    }

    /// The goal-subset width: the number of soft goals.
    pub fn soft_width(&self) -> u8 {
        self.soft_goals.len() as u8
    }

    /// Hard goals followed by soft goals, in the fixed order used to index per-fact estimates.
    pub fn all_goal_facts(&self) -> Vec<Fact> {
        self.hard_goals.iter().chain(self.soft_goals.iter()).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Operator, VarId};

    fn world_with_one_bool_var() -> World {
        World::new(vec![crate::state::Variable {
            name: "p".into(),
            domain: vec!["false".into(), "true".into()],
        }])
    }

    #[test]
    fn rejects_overlapping_hard_and_soft_goals() {
        let world = world_with_one_bool_var();
        let init = world.make_initial_state();
        let f = Fact::new(VarId::from(0), 1);
        let err = Task::new(world, init, Operators::new(), vec![f], vec![f], Mutexes::new(), vec![]).unwrap_err();
        assert!(matches!(err, PlannerError::InputError(_)));
    }

    #[test]
    fn rejects_too_many_soft_goals() {
        let world = World::new(vec![crate::state::Variable {
            name: "p".into(),
            domain: vec!["false".into(), "true".into()],
        }]);
        let init = world.make_initial_state();
        let f = Fact::new(VarId::from(0), 1);
        let too_many = vec![f; 65];
        let err = Task::new(world, init, Operators::new(), vec![], too_many, Mutexes::new(), vec![]).unwrap_err();
        assert!(matches!(err, PlannerError::InputError(_)));
    }

    #[test]
    fn rejects_dangling_relaxed_task_reference() {
        let world = world_with_one_bool_var();
        let init = world.make_initial_state();
        let bad = RelaxedTaskDef {
            name: "r0".into(),
            upper_cover: vec!["missing".into()],
            ..Default::default()
        };
        let err = Task::new(world, init, Operators::new(), vec![], vec![], Mutexes::new(), vec![bad]).unwrap_err();
        assert!(matches!(err, PlannerError::InputError(_)));
    }

    #[test]
    fn accepts_well_formed_task() {
        let world = world_with_one_bool_var();
        let init = world.make_initial_state();
        let mut ops = Operators::new();
        ops.push(Operator {
            name: "flip".into(),
            precond: vec![Fact::new(VarId::from(0), 0)],
            effects: vec![Fact::new(VarId::from(0), 1)],
            cost: 1,
        });
        let soft = Fact::new(VarId::from(0), 1);
        let task = Task::new(world, init, ops, vec![], vec![soft], Mutexes::new(), vec![]).unwrap();
        assert_eq!(task.soft_width(), 1);
    }
}
