//! Internal parameters not promoted to user-facing CLI flags, tunable via environment variables
//! following this workspace's `env_param::EnvParam` convention for knobs that aren't worth a CLI
//! flag of their own.

use env_param::EnvParam;

/// Default multiplicative bound-increase factor for the iterated DFS driver (`Config::step`),
/// when the CLI doesn't override it with `--step`.
pub static DEFAULT_STEP: EnvParam<f64> = EnvParam::new("MUGS_DEFAULT_STEP", "2.0");

/// How many expansions the best-first/Tarjan drivers process between wall-clock deadline polls.
/// `1` polls on every expansion; raising it trades deadline precision for less `Instant::now()`
/// overhead on very fast-expanding tasks.
pub static DEADLINE_POLL_EVERY_N: EnvParam<u32> = EnvParam::new("MUGS_DEADLINE_POLL_EVERY_N", "1");
