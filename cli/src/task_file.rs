//! Component I's loader half: a `serde`-derived mirror of the JSON task format and the conversion
//! into the `mugs_model` structures the engine actually runs on.
//!
//! Kept deliberately dumb: no finite-domain grounding, no PDDL parsing — those remain external
//! collaborators; this just reads an already-grounded JSON schema, sharing its `serde_json`
//! dependency with the output side.

use anyhow::{bail, Context, Result};
use mugs_model::state::{Fact, Operator, Operators, VarId, Variable, World};
use mugs_model::task::{Mutexes, RelaxedTaskDef};
use mugs_model::Task;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct FactFile(u32, u32);

#[derive(Debug, Deserialize)]
struct VariableFile {
    name: String,
    domain: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OperatorFile {
    name: String,
    #[serde(default)]
    pre: Vec<FactFile>,
    eff: Vec<FactFile>,
    cost: u32,
}

#[derive(Debug, Deserialize)]
struct RelaxedTaskFile {
    name: String,
    #[serde(default)]
    lower_cover: Vec<String>,
    #[serde(default)]
    upper_cover: Vec<String>,
    #[serde(default)]
    init_override: Vec<FactFile>,
    #[serde(default)]
    disabled_operators: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MutexFile(FactFile, FactFile);

#[derive(Debug, Deserialize)]
struct TaskFile {
    variables: Vec<VariableFile>,
    operators: Vec<OperatorFile>,
    init: Vec<u32>,
    hard_goals: Vec<FactFile>,
    soft_goals: Vec<FactFile>,
    #[serde(default)]
    mutexes: Vec<MutexFile>,
    #[serde(default)]
    relaxed_tasks: Vec<RelaxedTaskFile>,
}

fn fact(f: &FactFile) -> Fact {
    Fact::new(VarId::from_u32(f.0), f.1)
}

/// Reads `path` as JSON and builds a fully validated [`Task`], raising
/// [`mugs_model::PlannerError::InputError`] (wrapped in the returned `anyhow::Error`) for
/// anything [`Task::new`] itself rejects, plus a handful of schema-level checks (`init`'s length,
/// unresolvable operator names in `disabled_operators`) that only make sense at load time.
pub fn load_task(path: &Path) -> Result<Task> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading task file {}", path.display()))?;
    let file: TaskFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing task file {} as JSON", path.display()))?;

    let world = World::new(
        file.variables
            .into_iter()
            .map(|v| Variable {
                name: v.name,
                domain: v.domain,
            })
            .collect(),
    );

    if file.init.len() != world.num_variables() {
        bail!(
            "`init` has {} entries but {} variables are declared",
            file.init.len(),
            world.num_variables()
        );
    }
    let mut initial_state = world.make_initial_state();
    for (i, &val) in file.init.iter().enumerate() {
        initial_state.set(Fact::new(VarId::from(i), val));
    }

    let mut operators = Operators::new();
    let mut operator_names: Vec<String> = Vec::with_capacity(file.operators.len());
    for op in file.operators {
        operator_names.push(op.name.clone());
        operators.push(Operator {
            name: op.name,
            precond: op.pre.iter().map(fact).collect(),
            effects: op.eff.iter().map(fact).collect(),
            cost: op.cost,
        });
    }

    let hard_goals: Vec<Fact> = file.hard_goals.iter().map(fact).collect();
    let soft_goals: Vec<Fact> = file.soft_goals.iter().map(fact).collect();

    let mut mutexes = Mutexes::new();
    for MutexFile(a, b) in &file.mutexes {
        mutexes.add(fact(a), fact(b));
    }

    let mut relaxed_tasks: Vec<RelaxedTaskDef> = Vec::with_capacity(file.relaxed_tasks.len());
    for r in file.relaxed_tasks {
        for disabled in &r.disabled_operators {
            if !operator_names.iter().any(|name| name == disabled) {
                bail!(
                    "relaxed task `{}` disables unknown operator `{}`",
                    r.name,
                    disabled
                );
            }
        }
        relaxed_tasks.push(RelaxedTaskDef {
            name: r.name,
            lower_cover: r.lower_cover,
            upper_cover: r.upper_cover,
            init_override: r.init_override.iter().map(fact).collect(),
            disabled_operators: r.disabled_operators,
        });
    }

    let task = Task::new(world, initial_state, operators, hard_goals, soft_goals, mutexes, relaxed_tasks)?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_task(json: &str) -> tempfile_shim::TempPath {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("mugs_cli_test_{}_{}.json", std::process::id(), n));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(json.as_bytes()).unwrap();
        tempfile_shim::TempPath(path)
    }

    /// A minimal drop-guarded temp-file path, avoiding a `tempfile` dev-dependency for a single
    /// test helper.
    mod tempfile_shim {
        pub struct TempPath(pub std::path::PathBuf);
        impl std::ops::Deref for TempPath {
            type Target = std::path::Path;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }

    #[test]
    fn loads_a_well_formed_task() {
        let json = r#"{
            "variables": [{"name": "loc", "domain": ["a", "b"]}],
            "operators": [{"name": "a-to-b", "pre": [[0, 0]], "eff": [[0, 1]], "cost": 1}],
            "init": [0],
            "hard_goals": [],
            "soft_goals": [[0, 1]]
        }"#;
        let path = write_task(json);
        let task = load_task(&path).unwrap();
        assert_eq!(task.soft_width(), 1);
        assert_eq!(task.operators.size(), 1);
    }

    #[test]
    fn rejects_init_of_wrong_length() {
        let json = r#"{
            "variables": [{"name": "loc", "domain": ["a", "b"]}],
            "operators": [],
            "init": [0, 0],
            "hard_goals": [],
            "soft_goals": []
        }"#;
        let path = write_task(json);
        assert!(load_task(&path).is_err());
    }

    #[test]
    fn rejects_a_relaxed_task_disabling_an_unknown_operator() {
        let json = r#"{
            "variables": [{"name": "loc", "domain": ["a", "b"]}],
            "operators": [{"name": "a-to-b", "pre": [[0, 0]], "eff": [[0, 1]], "cost": 1}],
            "init": [0],
            "hard_goals": [],
            "soft_goals": [[0, 1]],
            "relaxed_tasks": [{"name": "drop-ab", "disabled_operators": ["no-such-op"]}]
        }"#;
        let path = write_task(json);
        assert!(load_task(&path).is_err());
    }
}
