pub mod errors;
pub mod eval;
pub mod msgs;
pub mod state;
pub mod task;

pub use errors::{PlannerError, PlannerResult};
pub use state::{Fact, OpId, Operator, Operators, State, VarId, Variable, World};
pub use task::{Mutexes, RelaxedTaskDef, Task};
