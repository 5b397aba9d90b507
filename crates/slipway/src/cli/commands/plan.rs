//! Plan command — show what a target would execute

use clap::Args;

use crate::cli::output;
use crate::cli::Cli;
use crate::targets;

/// Show the execution plan of a target without running anything
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// The target to plan
    pub target: String,
}

impl PlanCommand {
    pub fn execute(&self, _cli: &Cli) -> anyhow::Result<()> {
        let registry = targets::build_registry()?;
        let plan = registry.plan(&self.target)?;

        println!("{}", output::header(&format!("Plan for '{}'", self.target)));
        println!();
        print!("{}", plan.describe());
        Ok(())
    }
}
