//! JSON emission: turns `GoalSubset`s back into fact-name strings, and assembles the two document
//! shapes (one-shot vs. iterated) the CLI can produce.

use mugs_collections::GoalSubset;
use mugs_model::state::Fact;
use mugs_model::World;
use mugs_search::report::{DriverReport, IteratedReport, TaskMugs};
use serde::Serialize;

fn subset_to_names(world: &World, soft_goals: &[Fact], subset: &GoalSubset) -> Vec<String> {
    subset.iter().map(|i| world.fact_name(soft_goals[i as usize])).collect()
}

fn mugs_to_names(world: &World, soft_goals: &[Fact], mugs: &[GoalSubset]) -> Vec<Vec<String>> {
    mugs.iter().map(|m| subset_to_names(world, soft_goals, m)).collect()
}

/// The one-shot document (best-first or Tarjan driver): a bare MUGS array.
pub fn one_shot_document(world: &World, soft_goals: &[Fact], report: &DriverReport) -> serde_json::Value {
    serde_json::json!(mugs_to_names(world, soft_goals, &report.mugs))
}

#[derive(Debug, Serialize)]
struct TaskMugsDoc {
    name: String,
    solvable: bool,
    mugs: Vec<Vec<String>>,
}

/// The iterated-relaxation document: a list of `{name, solvable, mugs}` objects, one per task in
/// the relaxation lattice.
pub fn iterated_document(world: &World, soft_goals: &[Fact], report: &IteratedReport) -> serde_json::Value {
    let docs: Vec<TaskMugsDoc> = report
        .tasks
        .iter()
        .map(|t: &TaskMugs| TaskMugsDoc {
            name: t.name.clone(),
            solvable: t.solvable,
            mugs: mugs_to_names(world, soft_goals, &t.mugs),
        })
        .collect();
    serde_json::json!(docs)
}

/// One line of anytime output: the newly added MSGS as a single-line list
/// of fact names, printed as a JSON array so a consumer can parse it the same way as the final
/// document without a second grammar.
pub fn anytime_line(world: &World, soft_goals: &[Fact], subset: &GoalSubset) -> String {
    serde_json::to_string(&subset_to_names(world, soft_goals, subset)).expect("Vec<String> always serializes")
}
