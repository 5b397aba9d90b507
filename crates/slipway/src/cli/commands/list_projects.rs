//! List-projects command — show what discovery finds

use clap::Args;

use crate::cli::output;
use crate::cli::params::BuildParams;
use crate::cli::Cli;
use crate::run_context::PROJECT_PATTERN;

/// List the discovered application, test and package projects
#[derive(Debug, Args)]
pub struct ListProjectsCommand {
    #[command(flatten)]
    pub params: BuildParams,
}

impl ListProjectsCommand {
    pub fn execute(&self, _cli: &Cli) -> anyhow::Result<()> {
        let ctx = self.params.resolve()?;

        let applications = ctx.application_projects()?;
        println!("{}", output::header("Applications"));
        for project in &applications {
            println!(
                "{}",
                output::key_value(
                    &project.short_name(),
                    &format!("{:?} ({})", project.kind, project.path.display()),
                )
            );
        }
        if applications.is_empty() {
            output::warning("no runnable applications found");
        }

        let tests = ctx.test_projects()?;
        println!();
        println!("{}", output::header("Tests"));
        for project in &tests {
            println!(
                "{}",
                output::key_value(&project.base_name(), &project.path.display().to_string())
            );
        }

        let all = ctx
            .locator
            .find_projects(&ctx.build.source_dir(), PROJECT_PATTERN)?;
        let packages: Vec<_> = all
            .iter()
            .filter(|p| p.kind == slipway_core::ProjectKind::Package)
            .collect();
        println!();
        println!("{}", output::header("Packages"));
        for project in &packages {
            println!(
                "{}",
                output::key_value(&project.base_name(), &project.path.display().to_string())
            );
        }

        Ok(())
    }
}
