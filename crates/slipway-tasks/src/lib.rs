//! Task orchestration engine
//!
//! A registry of named tasks with dependency and ordering edges, planned
//! into execution waves and run concurrently on tokio. Tasks are generic
//! over a caller-supplied context.

pub mod batch;
pub mod graph;
pub mod reporter;
pub mod scheduler;
pub mod task;

pub use batch::{run_all, BatchError};
pub use graph::{GraphError, TaskPlan, TaskRegistry};
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TracingReporter};
pub use scheduler::{
    RunError, RunSummary, Scheduler, SchedulerOptions, TaskResult, TaskStatus,
};
pub use task::{ParamCheck, Predicate, TaskBody, TaskDefinition};
