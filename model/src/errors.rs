use thiserror::Error;

/// Errors that abort the driver outright.
///
/// Budget exhaustion, evaluator dead-ends and refinement failure are deliberately absent as
/// variants: they are recovered entirely within the expansion loop and never escape as a
/// `Result::Err`.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("malformed task: {0}")]
    InputError(String),
    #[error("search aborted: out of resource (deadline or memory cap reached)")]
    OutOfResource,
}

pub type PlannerResult<T> = Result<T, PlannerError>;
