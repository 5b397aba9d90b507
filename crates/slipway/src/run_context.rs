//! Shared context of one orchestration run
//!
//! Built once from the CLI parameters and handed read-only to every task
//! body.

use std::path::PathBuf;

use anyhow::Context as _;

use slipway_core::{BuildContext, ProjectLocator, ProjectRef, ToolRunner};

/// Glob matching project files under a source root
pub const PROJECT_PATTERN: &str = "**/*.csproj";

/// Everything task bodies need: the resolved build context, project
/// discovery, and the delivery parameters of the deploy chain.
pub struct RunContext {
    /// Resolved build parameters and derived paths
    pub build: BuildContext,
    /// Project discovery with the deny-list applied
    pub locator: ProjectLocator,
    /// Product the deployed group belongs to
    pub product: Option<String>,
    /// Target environment (e.g. `staging`, `production`)
    pub environment: Option<String>,
    /// Application group to deliver
    pub group: Option<String>,
    /// Short names of the apps to deliver; empty means every runnable app
    pub apps: Vec<String>,
    /// Kubeconfig selecting the target cluster
    pub kubeconfig: Option<PathBuf>,
    /// Raw registry parameters, checked individually before a run
    pub registry_server: Option<String>,
    /// Registry user name
    pub registry_user: Option<String>,
    /// Registry password
    pub registry_password: Option<String>,
    /// Account token of the deploy tracker
    pub tracker_token: Option<String>,
    /// User name reported to the deploy tracker
    pub tracker_username: String,
    /// Also push a `latest` alias for every image
    pub push_latest: bool,
}

impl RunContext {
    /// A tool runner following the context's tolerance policy
    pub fn runner(&self) -> ToolRunner {
        ToolRunner::new().with_tolerate_errors(self.build.tolerate_errors)
    }

    /// The runnable application projects under the source root
    pub fn application_projects(&self) -> anyhow::Result<Vec<ProjectRef>> {
        self.locator
            .application_projects(&self.build.source_dir(), PROJECT_PATTERN)
            .context("application discovery failed")
    }

    /// The test projects under the tests root
    pub fn test_projects(&self) -> anyhow::Result<Vec<ProjectRef>> {
        self.locator
            .test_projects(&self.build.tests_dir(), PROJECT_PATTERN)
            .context("test discovery failed")
    }

    /// The applications selected for delivery: every runnable app, or
    /// only those named with `--app`, matched case-insensitively
    pub fn delivery_projects(&self) -> anyhow::Result<Vec<ProjectRef>> {
        let projects = self.application_projects()?;
        if self.apps.is_empty() {
            return Ok(projects);
        }
        Ok(projects
            .into_iter()
            .filter(|p| {
                let short = p.short_name();
                self.apps.iter().any(|a| a.eq_ignore_ascii_case(&short))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_project(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "<Project/>").unwrap();
    }

    fn context(root: &TempDir, apps: Vec<String>) -> RunContext {
        RunContext {
            build: BuildContext::new(root.path()).with_branch("main"),
            locator: ProjectLocator::new(),
            product: Some("shop".to_string()),
            environment: Some("staging".to_string()),
            group: Some("backend".to_string()),
            apps,
            kubeconfig: None,
            registry_server: None,
            registry_user: None,
            registry_password: None,
            tracker_token: None,
            tracker_username: "slipway".to_string(),
            push_latest: false,
        }
    }

    #[test]
    fn test_delivery_selection_filters_by_short_name() {
        let root = TempDir::new().unwrap();
        write_project(root.path(), "src/Orders.RestAPI/Orders.RestAPI.csproj");
        write_project(root.path(), "src/Billing.App/Billing.App.csproj");

        let all = context(&root, Vec::new()).delivery_projects().unwrap();
        assert_eq!(all.len(), 2);

        let selected = context(&root, vec!["billing".to_string()])
            .delivery_projects()
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].short_name(), "Billing");
    }

    #[test]
    fn test_test_projects_only_under_tests_root() {
        let root = TempDir::new().unwrap();
        write_project(root.path(), "src/Orders.RestAPI/Orders.RestAPI.csproj");
        write_project(root.path(), "tests/Orders.Tests/Orders.Tests.csproj");

        let ctx = context(&root, Vec::new());
        let tests = ctx.test_projects().unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].base_name(), "Orders.Tests");
    }
}
