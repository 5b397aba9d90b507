//! Task registry and execution planning
//!
//! The registry holds the static graph declared at process start. Planning
//! a target resolves the transitive `depends_on` closure, applies `after`
//! ordering hints among the included tasks, and groups tasks into waves
//! that can run in parallel.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::task::TaskDefinition;

/// Errors during registration and planning
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A task with the same name is already registered
    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    /// The requested target does not exist
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    /// A dependency edge points at an unregistered task
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    /// Cyclic dependency detected
    #[error("Cyclic dependency detected among tasks: {0}")]
    CyclicDependency(String),
}

/// The static set of task definitions for one process
pub struct TaskRegistry<C> {
    tasks: HashMap<String, Arc<TaskDefinition<C>>>,
}

impl<C> TaskRegistry<C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Register a task definition; names must be unique
    pub fn register(&mut self, definition: TaskDefinition<C>) -> Result<(), GraphError> {
        let name = definition.name.clone();
        if self.tasks.contains_key(&name) {
            return Err(GraphError::DuplicateTask(name));
        }
        self.tasks.insert(name, Arc::new(definition));
        Ok(())
    }

    /// Look up a task by name
    pub fn get(&self, name: &str) -> Option<&Arc<TaskDefinition<C>>> {
        self.tasks.get(name)
    }

    /// All registered task names, sorted
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the execution plan for a target task: the target plus its
    /// transitive `depends_on` closure, ordered and grouped into waves.
    pub fn plan(&self, target: &str) -> Result<TaskPlan<C>, GraphError> {
        if !self.tasks.contains_key(target) {
            return Err(GraphError::TaskNotFound(target.to_string()));
        }

        // Transitive depends_on closure; `after` edges never pull tasks in
        let mut included: HashMap<String, Arc<TaskDefinition<C>>> = HashMap::new();
        let mut queue: VecDeque<String> = VecDeque::from([target.to_string()]);
        while let Some(name) = queue.pop_front() {
            if included.contains_key(&name) {
                continue;
            }
            let task = self
                .tasks
                .get(&name)
                .ok_or_else(|| GraphError::TaskNotFound(name.clone()))?;
            for dep in &task.depends_on {
                if !self.tasks.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
                queue.push_back(dep.clone());
            }
            included.insert(name, task.clone());
        }

        // Ordering edges: hard dependencies plus after-hints restricted to
        // the included set
        let mut ordering: HashMap<String, HashSet<String>> = HashMap::new();
        let mut hard_deps: HashMap<String, HashSet<String>> = HashMap::new();
        for (name, task) in &included {
            let deps: HashSet<String> = task.depends_on.iter().cloned().collect();
            let mut edges = deps.clone();
            for hint in &task.after {
                if included.contains_key(hint) {
                    edges.insert(hint.clone());
                }
            }
            hard_deps.insert(name.clone(), deps);
            ordering.insert(name.clone(), edges);
        }

        let sorted = topological_sort(&ordering)?;
        let waves = compute_waves(&ordering, &sorted);

        debug!(
            target,
            task_count = included.len(),
            wave_count = waves.len(),
            "execution plan resolved"
        );

        Ok(TaskPlan {
            tasks: included,
            hard_deps,
            sorted,
            waves,
        })
    }
}

impl<C> Default for TaskRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Kahn's algorithm over the ordering edges
fn topological_sort(edges: &HashMap<String, HashSet<String>>) -> Result<Vec<String>, GraphError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (name, deps) in edges {
        in_degree.insert(name, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(name);
        }
    }

    let mut queue: VecDeque<&str> = {
        let mut roots: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        roots.sort_unstable();
        roots.into()
    };

    let mut sorted: Vec<String> = Vec::with_capacity(edges.len());
    while let Some(name) = queue.pop_front() {
        sorted.push(name.to_string());
        if let Some(deps) = dependents.get(name) {
            for dependent in deps {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }

    if sorted.len() != edges.len() {
        let in_sorted: HashSet<&str> = sorted.iter().map(String::as_str).collect();
        let mut cyclic: Vec<&str> = edges
            .keys()
            .map(String::as_str)
            .filter(|n| !in_sorted.contains(*n))
            .collect();
        cyclic.sort_unstable();
        return Err(GraphError::CyclicDependency(cyclic.join(", ")));
    }

    Ok(sorted)
}

/// Group tasks by ordering depth; tasks in the same wave can run in parallel
fn compute_waves(
    edges: &HashMap<String, HashSet<String>>,
    sorted: &[String],
) -> Vec<Vec<String>> {
    let mut wave_of: HashMap<&str, usize> = HashMap::new();
    for name in sorted {
        let wave = edges
            .get(name)
            .map(|deps| {
                deps.iter()
                    .filter_map(|d| wave_of.get(d.as_str()))
                    .max()
                    .map(|w| w + 1)
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        wave_of.insert(name, wave);
    }

    let max_wave = wave_of.values().max().copied().unwrap_or(0);
    let mut waves: Vec<Vec<String>> = vec![Vec::new(); max_wave + 1];
    for name in sorted {
        waves[wave_of[name.as_str()]].push(name.clone());
    }
    waves
}

/// A resolved execution plan for one target
pub struct TaskPlan<C> {
    tasks: HashMap<String, Arc<TaskDefinition<C>>>,
    hard_deps: HashMap<String, HashSet<String>>,
    sorted: Vec<String>,
    waves: Vec<Vec<String>>,
}

impl<C> TaskPlan<C> {
    /// Get an included task by name
    pub fn get(&self, name: &str) -> Option<&Arc<TaskDefinition<C>>> {
        self.tasks.get(name)
    }

    /// Hard `depends_on` edges of a task, restricted to the plan
    pub fn dependencies_of(&self, name: &str) -> Option<&HashSet<String>> {
        self.hard_deps.get(name)
    }

    /// Topologically sorted task order
    pub fn sorted(&self) -> &[String] {
        &self.sorted
    }

    /// Execution waves (wave 0 first); tasks within a wave are independent
    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    /// Number of included tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Human-readable summary of the execution plan
    pub fn describe(&self) -> String {
        let mut plan = String::new();
        for (i, wave) in self.waves.iter().enumerate() {
            plan.push_str(&format!("Wave {} ({} tasks):\n", i, wave.len()));
            for name in wave {
                match self.hard_deps.get(name).filter(|d| !d.is_empty()) {
                    Some(deps) => {
                        let mut deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                        deps.sort_unstable();
                        plan.push_str(&format!("  {} (after: {})\n", name, deps.join(", ")));
                    }
                    None => plan.push_str(&format!("  {}\n", name)),
                }
            }
        }
        plan
    }

    /// Log the plan at info level
    pub fn log(&self) {
        info!(tasks = self.len(), waves = self.waves.len(), "execution plan");
    }
}
