//! The search crate: state registry, runtime configuration, and the three drivers (best-first,
//! Tarjan DFS with conflict learning, iterated relaxation) that consume the `model` crate's task,
//! evaluator and MSGS-collection types.

pub mod best_first;
pub mod config;
pub mod iterated;
pub mod registry;
pub mod report;
pub mod tarjan;
pub mod tuning;

pub use best_first::BestFirstDriver;
pub use config::Config;
pub use iterated::IteratedDriver;
pub use registry::{NodeStatus, SearchNode, StateId, StateRegistry};
pub use report::{DriverReport, SearchStats, Termination};
pub use tarjan::TarjanDriver;
