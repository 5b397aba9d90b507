//! Run command — execute a target and its dependencies

use std::fmt;
use std::sync::Arc;

use clap::Args;
use console::style;

use slipway_tasks::{Scheduler, SchedulerOptions, TaskEvent, TaskReporter, TracingReporter};

use crate::cli::params::BuildParams;
use crate::cli::Cli;
use crate::targets;

/// Run a target and everything it depends on
#[derive(Debug, Args)]
pub struct RunCommand {
    /// The target to run (e.g. compile, test, package, deploy)
    pub target: String,

    /// Maximum concurrent tasks
    #[arg(long)]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub params: BuildParams,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let ctx = Arc::new(self.params.resolve()?);
        let registry = targets::build_registry()?;

        if cli.verbose && !cli.quiet {
            println!("{}", style("Execution plan").bold());
            print!("{}", registry.plan(&self.target)?.describe());
            println!();
        }

        let reporter: Arc<dyn TaskReporter> = if cli.quiet {
            Arc::new(TracingReporter)
        } else {
            Arc::new(ConsoleReporter)
        };

        let mut options = SchedulerOptions::default();
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }

        let scheduler = Scheduler::new(options, reporter);
        let summary = scheduler.run(&registry, &self.target, ctx).await?;

        if !summary.is_success() {
            if !cli.quiet {
                println!();
                for line in summary.failure_report().lines() {
                    println!("  {} {}", style("✗").red(), line);
                }
            }
            return Err(TasksFailed {
                count: summary.failures().len(),
            }
            .into());
        }

        Ok(())
    }
}

/// Terminal error of a run with failing tasks
#[derive(Debug)]
pub struct TasksFailed {
    /// Number of failed or blocked tasks
    pub count: usize,
}

impl fmt::Display for TasksFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} task{} failed",
            self.count,
            if self.count == 1 { "" } else { "s" }
        )
    }
}

impl std::error::Error for TasksFailed {}

/// Console reporter with live output
struct ConsoleReporter;

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { name } => {
                println!("  {} {}", style("▸").dim(), style(name).bold());
            }
            TaskEvent::Completed { name, duration } => {
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(name).green(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            TaskEvent::Failed {
                name,
                duration,
                error,
            } => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(name).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(error).red().dim()
                );
            }
            TaskEvent::Skipped { name, reason } => {
                println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(name).yellow(),
                    style(format!("({})", reason)).dim()
                );
            }
            TaskEvent::Blocked { name, dependency } => {
                println!(
                    "  {} {} {}",
                    style("✗").red(),
                    style(name).red(),
                    style(format!("(dependency '{}' failed)", dependency)).dim()
                );
            }
            TaskEvent::WaveStarted { .. } => {}
            TaskEvent::RunCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                println!();
                println!(
                    "  {} {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
                    if *failed == 0 {
                        style("✓").green().bold()
                    } else {
                        style("✗").red().bold()
                    },
                    succeeded,
                    total,
                    failed,
                    skipped,
                    duration.as_secs_f64()
                );
            }
        }
    }
}
