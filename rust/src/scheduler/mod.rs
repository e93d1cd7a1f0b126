//! Scheduling pipeline: dependency solving, phase planning and the
//! request-facing service that composes them.

mod planner;
mod service;
mod solver;

pub use planner::ConcurrencyPlanner;
pub use service::{ScheduleError, ScheduleRequest, SchedulerService};
pub use solver::{critical_path, DependencySolver};
