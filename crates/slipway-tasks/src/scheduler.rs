//! Task scheduler — executes a plan wave by wave on the tokio runtime
//!
//! Bodies are blocking (they wrap subprocess calls), so each one runs on
//! the blocking pool. A failing task never cancels siblings already
//! running in its wave; its dependents are reported as blocked instead of
//! executed. Every task executes at most once per run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::warn;

use crate::graph::{GraphError, TaskRegistry};
use crate::reporter::{TaskEvent, TaskReporter};

/// Outcome of a single task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The body returned success
    Success,
    /// The skip guard turned the task off; dependents still run
    Skipped(String),
    /// The body returned an error
    Failed(String),
    /// A dependency failed, so the task was never started
    Blocked(String),
}

impl TaskStatus {
    /// Whether the status satisfies dependents
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped(_))
    }

    /// Whether the status counts against the run
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Blocked(_))
    }
}

/// Result of a single task execution
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task name
    pub name: String,
    /// Outcome
    pub status: TaskStatus,
    /// How long the task took (zero for skipped/blocked tasks)
    pub duration: Duration,
}

/// Aggregate result of one run, in topological order
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Per-task results
    pub results: Vec<TaskResult>,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Whether every task succeeded or was skipped
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| !r.status.is_failure())
    }

    /// The failing tasks, in order
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.results
            .iter()
            .filter(|r| r.status.is_failure())
            .collect()
    }

    /// Result for a specific task
    pub fn get(&self, name: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// One line per failing task, naming the task and why it failed
    pub fn failure_report(&self) -> String {
        self.failures()
            .iter()
            .map(|r| match &r.status {
                TaskStatus::Failed(error) => format!("task '{}' failed: {}", r.name, error),
                TaskStatus::Blocked(dependency) => {
                    format!("task '{}' blocked: dependency '{}' failed", r.name, dependency)
                }
                _ => unreachable!(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Errors that abort a run before any task body executes
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Planning failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A required parameter of an included task is absent
    #[error("Task '{task}' requires parameter '{parameter}' which is not set")]
    MissingParameter { task: String, parameter: String },
}

/// Options for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Maximum concurrent task bodies
    pub concurrency: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Executes a target task and its dependency closure
pub struct Scheduler<C> {
    options: SchedulerOptions,
    reporter: Arc<dyn TaskReporter>,
    _context: std::marker::PhantomData<fn(C)>,
}

impl<C: Send + Sync + 'static> Scheduler<C> {
    /// Create a scheduler
    pub fn new(options: SchedulerOptions, reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            options,
            reporter,
            _context: std::marker::PhantomData,
        }
    }

    /// Run `target` and its transitive dependencies against the context.
    ///
    /// Required-parameter checks of every included task run first; a
    /// missing parameter aborts the run before anything executes.
    pub async fn run(
        &self,
        registry: &TaskRegistry<C>,
        target: &str,
        ctx: Arc<C>,
    ) -> Result<RunSummary, RunError> {
        let start = Instant::now();
        let plan = registry.plan(target)?;
        plan.log();

        for name in plan.sorted() {
            let task = plan.get(name).expect("planned task");
            for check in &task.requires {
                if !check.is_satisfied(&ctx) {
                    return Err(RunError::MissingParameter {
                        task: name.clone(),
                        parameter: check.name().to_string(),
                    });
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut statuses: HashMap<String, TaskStatus> = HashMap::new();
        let mut durations: HashMap<String, Duration> = HashMap::new();

        for (wave_idx, wave) in plan.waves().iter().enumerate() {
            self.reporter.report(&TaskEvent::WaveStarted {
                wave: wave_idx,
                task_count: wave.len(),
            });

            let mut handles = Vec::new();

            for name in wave {
                let task = plan.get(name).expect("planned task").clone();

                // A failed or blocked dependency blocks the task; skipped
                // dependencies satisfy it
                let failed_dep = plan
                    .dependencies_of(name)
                    .and_then(|deps| {
                        deps.iter()
                            .find(|d| statuses.get(*d).is_some_and(|s| !s.satisfies_dependents()))
                    })
                    .cloned();
                if let Some(dependency) = failed_dep {
                    self.reporter.report(&TaskEvent::Blocked {
                        name: name.clone(),
                        dependency: dependency.clone(),
                    });
                    statuses.insert(name.clone(), TaskStatus::Blocked(dependency));
                    continue;
                }

                // Skip guard, evaluated once before the task starts
                if !task.should_run(&ctx) {
                    let reason = "condition not met".to_string();
                    self.reporter.report(&TaskEvent::Skipped {
                        name: name.clone(),
                        reason: reason.clone(),
                    });
                    statuses.insert(name.clone(), TaskStatus::Skipped(reason));
                    continue;
                }

                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");
                let ctx = ctx.clone();
                let reporter = self.reporter.clone();
                let task_name = name.clone();

                let handle = tokio::task::spawn_blocking(move || {
                    let task_start = Instant::now();
                    reporter.report(&TaskEvent::Started {
                        name: task_name.clone(),
                    });

                    let status = match task.run_body(&ctx) {
                        Ok(()) => {
                            reporter.report(&TaskEvent::Completed {
                                name: task_name.clone(),
                                duration: task_start.elapsed(),
                            });
                            TaskStatus::Success
                        }
                        Err(e) => {
                            let error = format!("{e:#}");
                            reporter.report(&TaskEvent::Failed {
                                name: task_name.clone(),
                                duration: task_start.elapsed(),
                                error: error.clone(),
                            });
                            TaskStatus::Failed(error)
                        }
                    };

                    drop(permit);
                    (status, task_start.elapsed())
                });

                handles.push((name.clone(), handle));
            }

            // Collect the whole wave before moving on; siblings of a failed
            // task always run to completion
            for (name, handle) in handles {
                match handle.await {
                    Ok((status, duration)) => {
                        durations.insert(name.clone(), duration);
                        statuses.insert(name, status);
                    }
                    Err(e) => {
                        warn!(task = %name, "task body panicked");
                        statuses.insert(name, TaskStatus::Failed(format!("task panicked: {e}")));
                    }
                }
            }
        }

        let results: Vec<TaskResult> = plan
            .sorted()
            .iter()
            .map(|name| TaskResult {
                name: name.clone(),
                status: statuses
                    .remove(name)
                    .unwrap_or_else(|| TaskStatus::Failed("never scheduled".to_string())),
                duration: durations.get(name).copied().unwrap_or(Duration::ZERO),
            })
            .collect();

        let duration = start.elapsed();
        self.reporter.report(&TaskEvent::RunCompleted {
            total: results.len(),
            succeeded: results
                .iter()
                .filter(|r| r.status == TaskStatus::Success)
                .count(),
            failed: results.iter().filter(|r| r.status.is_failure()).count(),
            skipped: results
                .iter()
                .filter(|r| matches!(r.status, TaskStatus::Skipped(_)))
                .count(),
            duration,
        });

        Ok(RunSummary { results, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ParamCheck, TaskDefinition};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Ctx {
        registry: Option<String>,
        log: Mutex<Vec<String>>,
        counter: AtomicUsize,
    }

    impl Ctx {
        fn record(&self, entry: &str) {
            self.log.lock().unwrap().push(entry.to_string());
        }
    }

    fn scheduler() -> Scheduler<Ctx> {
        Scheduler::new(
            SchedulerOptions::default(),
            Arc::new(crate::reporter::CollectingReporter::default()),
        )
    }

    #[tokio::test]
    async fn test_dependency_runs_before_dependent() {
        let mut reg: TaskRegistry<Ctx> = TaskRegistry::new();
        reg.register(TaskDefinition::new("a").executes(|c: &Ctx| {
            c.record("a");
            Ok(())
        }))
        .unwrap();
        reg.register(
            TaskDefinition::new("b")
                .depends_on("a")
                .executes(|c: &Ctx| {
                    c.record("b");
                    Ok(())
                }),
        )
        .unwrap();

        // Repeated runs to shake out scheduling races
        for _ in 0..20 {
            let ctx = Arc::new(Ctx::default());
            let summary = scheduler().run(&reg, "b", ctx.clone()).await.unwrap();
            assert!(summary.is_success());
            assert_eq!(*ctx.log.lock().unwrap(), vec!["a", "b"]);
        }
    }

    #[tokio::test]
    async fn test_each_task_runs_exactly_once() {
        let mut reg: TaskRegistry<Ctx> = TaskRegistry::new();
        reg.register(TaskDefinition::new("base").executes(|c: &Ctx| {
            c.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
        reg.register(TaskDefinition::new("left").depends_on("base"))
            .unwrap();
        reg.register(TaskDefinition::new("right").depends_on("base"))
            .unwrap();
        reg.register(
            TaskDefinition::new("top")
                .depends_on("left")
                .depends_on("right"),
        )
        .unwrap();

        let ctx = Arc::new(Ctx::default());
        let summary = scheduler().run(&reg, "top", ctx.clone()).await.unwrap();
        assert!(summary.is_success());
        assert_eq!(ctx.counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_parameter_aborts_before_execution() {
        let mut reg: TaskRegistry<Ctx> = TaskRegistry::new();
        reg.register(TaskDefinition::new("show").executes(|c: &Ctx| {
            c.record("show");
            Ok(())
        }))
        .unwrap();
        reg.register(
            TaskDefinition::new("push")
                .depends_on("show")
                .requires(ParamCheck::new("registry-server", |c: &Ctx| {
                    c.registry.is_some()
                })),
        )
        .unwrap();

        let ctx = Arc::new(Ctx::default());
        let err = scheduler().run(&reg, "push", ctx.clone()).await.unwrap_err();
        match err {
            RunError::MissingParameter { task, parameter } => {
                assert_eq!(task, "push");
                assert_eq!(parameter, "registry-server");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing ran, not even the dependency
        assert!(ctx.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_dependency_blocks_dependent() {
        let mut reg: TaskRegistry<Ctx> = TaskRegistry::new();
        reg.register(TaskDefinition::new("bad").executes(|_| anyhow::bail!("boom")))
            .unwrap();
        reg.register(
            TaskDefinition::new("dependent")
                .depends_on("bad")
                .executes(|c: &Ctx| {
                    c.record("dependent");
                    Ok(())
                }),
        )
        .unwrap();

        let ctx = Arc::new(Ctx::default());
        let summary = scheduler().run(&reg, "dependent", ctx.clone()).await.unwrap();

        assert!(!summary.is_success());
        assert!(matches!(
            summary.get("bad").unwrap().status,
            TaskStatus::Failed(_)
        ));
        assert!(matches!(
            summary.get("dependent").unwrap().status,
            TaskStatus::Blocked(_)
        ));
        assert!(ctx.log.lock().unwrap().is_empty());
        assert!(summary.failure_report().contains("task 'bad' failed"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_unrelated_tasks() {
        let mut reg: TaskRegistry<Ctx> = TaskRegistry::new();
        reg.register(TaskDefinition::new("bad").executes(|_| anyhow::bail!("boom")))
            .unwrap();
        reg.register(TaskDefinition::new("good").executes(|c: &Ctx| {
            c.record("good");
            Ok(())
        }))
        .unwrap();
        reg.register(
            TaskDefinition::new("later")
                .depends_on("good")
                .executes(|c: &Ctx| {
                    c.record("later");
                    Ok(())
                }),
        )
        .unwrap();
        reg.register(
            TaskDefinition::new("all")
                .depends_on("bad")
                .depends_on("later"),
        )
        .unwrap();

        let ctx = Arc::new(Ctx::default());
        let summary = scheduler().run(&reg, "all", ctx.clone()).await.unwrap();

        assert!(!summary.is_success());
        // The unrelated chain still ran to completion
        assert_eq!(*ctx.log.lock().unwrap(), vec!["good", "later"]);
        assert!(matches!(
            summary.get("all").unwrap().status,
            TaskStatus::Blocked(_)
        ));
    }

    #[tokio::test]
    async fn test_skip_does_not_block_dependents() {
        let mut reg: TaskRegistry<Ctx> = TaskRegistry::new();
        reg.register(
            TaskDefinition::new("optional")
                .only_when(|c: &Ctx| c.registry.is_some())
                .executes(|c: &Ctx| {
                    c.record("optional");
                    Ok(())
                }),
        )
        .unwrap();
        reg.register(
            TaskDefinition::new("dependent")
                .depends_on("optional")
                .executes(|c: &Ctx| {
                    c.record("dependent");
                    Ok(())
                }),
        )
        .unwrap();

        let ctx = Arc::new(Ctx::default());
        let summary = scheduler().run(&reg, "dependent", ctx.clone()).await.unwrap();

        assert!(summary.is_success());
        assert!(matches!(
            summary.get("optional").unwrap().status,
            TaskStatus::Skipped(_)
        ));
        assert_eq!(*ctx.log.lock().unwrap(), vec!["dependent"]);
    }

    #[tokio::test]
    async fn test_summary_in_topological_order() {
        let mut reg: TaskRegistry<Ctx> = TaskRegistry::new();
        reg.register(TaskDefinition::new("show")).unwrap();
        reg.register(TaskDefinition::new("publish").depends_on("show"))
            .unwrap();
        reg.register(TaskDefinition::new("package").depends_on("publish"))
            .unwrap();

        let ctx = Arc::new(Ctx::default());
        let summary = scheduler().run(&reg, "package", ctx).await.unwrap();
        let names: Vec<&str> = summary.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["show", "publish", "package"]);
    }
}
