//! Task execution reporting

use std::time::Duration;

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A task is starting execution
    Started { name: String },
    /// A task completed successfully
    Completed { name: String, duration: Duration },
    /// A task failed
    Failed {
        name: String,
        duration: Duration,
        error: String,
    },
    /// A task was skipped by its guard
    Skipped { name: String, reason: String },
    /// A task was not run because a dependency failed
    Blocked { name: String, dependency: String },
    /// An execution wave is starting
    WaveStarted { wave: usize, task_count: usize },
    /// The run finished
    RunCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { name } => {
                tracing::info!("Starting {}", name);
            }
            TaskEvent::Completed { name, duration } => {
                tracing::info!("{} completed in {:.1}s", name, duration.as_secs_f64());
            }
            TaskEvent::Failed {
                name,
                duration,
                error,
            } => {
                tracing::error!("{} failed after {:.1}s: {}", name, duration.as_secs_f64(), error);
            }
            TaskEvent::Skipped { name, reason } => {
                tracing::info!("{} skipped: {}", name, reason);
            }
            TaskEvent::Blocked { name, dependency } => {
                tracing::warn!("{} not run: dependency '{}' failed", name, dependency);
            }
            TaskEvent::WaveStarted { wave, task_count } => {
                tracing::debug!("Starting wave {} ({} tasks)", wave, task_count);
            }
            TaskEvent::RunCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                tracing::info!(
                    "Run complete: {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
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

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();

        reporter.report(&TaskEvent::Started {
            name: "package".to_string(),
        });
        reporter.report(&TaskEvent::Completed {
            name: "package".to_string(),
            duration: Duration::from_secs(5),
        });

        assert_eq!(reporter.events().len(), 2);
    }

    #[test]
    fn test_tracing_reporter_does_not_panic() {
        let reporter = TracingReporter;
        reporter.report(&TaskEvent::Blocked {
            name: "push".to_string(),
            dependency: "package".to_string(),
        });
        reporter.report(&TaskEvent::RunCompleted {
            total: 3,
            succeeded: 2,
            failed: 1,
            skipped: 0,
            duration: Duration::from_secs(1),
        });
    }
}
