//! Task definitions
//!
//! A task couples a name, its dependency edges and guards, and a body.
//! Definitions are declared once at process start into a
//! [`crate::graph::TaskRegistry`] and never mutated afterwards. They are
//! generic over a caller-supplied context type that bodies and guards
//! receive by reference.

use std::fmt;
use std::sync::Arc;

/// Predicate over the run context
pub type Predicate<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// Task body: one action producing success or failure
pub type TaskBody<C> = Arc<dyn Fn(&C) -> anyhow::Result<()> + Send + Sync>;

/// A named presence check for a required configuration value.
///
/// Checks run for every included task before anything executes, so a
/// missing parameter aborts the run up front, naming what is missing.
pub struct ParamCheck<C> {
    name: String,
    check: Predicate<C>,
}

impl<C> ParamCheck<C> {
    /// Create a check for the named parameter
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// The parameter name reported when the check fails
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the parameter is present in the given context
    pub fn is_satisfied(&self, ctx: &C) -> bool {
        (self.check)(ctx)
    }
}

impl<C> Clone for ParamCheck<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            check: self.check.clone(),
        }
    }
}

impl<C> fmt::Debug for ParamCheck<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamCheck")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Definition of one task in the graph
pub struct TaskDefinition<C> {
    /// Task name
    pub name: String,
    /// Tasks that must run (and succeed) before this one; running this
    /// task pulls them into the plan
    pub depends_on: Vec<String>,
    /// Ordering-only edges: when the named tasks are part of the plan,
    /// they run first, but they are not pulled in by this task
    pub after: Vec<String>,
    /// Required-parameter checks, validated before the run starts
    pub requires: Vec<ParamCheck<C>>,
    /// Skip guard, evaluated once immediately before the task starts
    pub only_when: Option<Predicate<C>>,
    body: Option<TaskBody<C>>,
}

impl<C> TaskDefinition<C> {
    /// Create a new task definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            after: Vec::new(),
            requires: Vec::new(),
            only_when: None,
            body: None,
        }
    }

    /// Add a dependency edge
    pub fn depends_on(mut self, task: impl Into<String>) -> Self {
        self.depends_on.push(task.into());
        self
    }

    /// Add an ordering-only edge
    pub fn after(mut self, task: impl Into<String>) -> Self {
        self.after.push(task.into());
        self
    }

    /// Add a required-parameter check
    pub fn requires(mut self, check: ParamCheck<C>) -> Self {
        self.requires.push(check);
        self
    }

    /// Set the skip guard
    pub fn only_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.only_when = Some(Arc::new(predicate));
        self
    }

    /// Set the body
    pub fn executes<F>(mut self, body: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    /// Run the body; a task without a body succeeds trivially
    pub fn run_body(&self, ctx: &C) -> anyhow::Result<()> {
        match &self.body {
            Some(body) => body(ctx),
            None => Ok(()),
        }
    }

    /// Whether the skip guard allows the task to run in this context
    pub fn should_run(&self, ctx: &C) -> bool {
        self.only_when.as_ref().map_or(true, |p| p(ctx))
    }
}

impl<C> fmt::Debug for TaskDefinition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("after", &self.after)
            .field("requires", &self.requires)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        registry: Option<String>,
    }

    #[test]
    fn test_definition_builder() {
        let def: TaskDefinition<Ctx> = TaskDefinition::new("push")
            .depends_on("show")
            .after("package")
            .requires(ParamCheck::new("registry", |c: &Ctx| c.registry.is_some()));

        assert_eq!(def.name, "push");
        assert_eq!(def.depends_on, vec!["show"]);
        assert_eq!(def.after, vec!["package"]);
        assert_eq!(def.requires.len(), 1);
    }

    #[test]
    fn test_param_check() {
        let check = ParamCheck::new("registry", |c: &Ctx| c.registry.is_some());
        assert!(!check.is_satisfied(&Ctx { registry: None }));
        assert!(check.is_satisfied(&Ctx {
            registry: Some("r".into())
        }));
        assert_eq!(check.name(), "registry");
    }

    #[test]
    fn test_bodyless_task_succeeds() {
        let def: TaskDefinition<Ctx> = TaskDefinition::new("noop");
        assert!(def.run_body(&Ctx { registry: None }).is_ok());
    }

    #[test]
    fn test_only_when_guard() {
        let def: TaskDefinition<Ctx> =
            TaskDefinition::new("deploy").only_when(|c: &Ctx| c.registry.is_some());
        assert!(!def.should_run(&Ctx { registry: None }));
        assert!(def.should_run(&Ctx {
            registry: Some("r".into())
        }));
    }

    #[test]
    fn test_no_guard_always_runs() {
        let def: TaskDefinition<Ctx> = TaskDefinition::new("show");
        assert!(def.should_run(&Ctx { registry: None }));
    }

    #[test]
    fn test_body_failure_propagates() {
        let def: TaskDefinition<Ctx> =
            TaskDefinition::new("bad").executes(|_| anyhow::bail!("boom"));
        let err = def.run_body(&Ctx { registry: None }).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
