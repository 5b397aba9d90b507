//! CLI commands

mod list_projects;
mod plan;
mod run;

pub use list_projects::ListProjectsCommand;
pub use plan::PlanCommand;
pub use run::{RunCommand, TasksFailed};
