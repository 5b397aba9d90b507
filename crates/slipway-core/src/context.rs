//! Build context: resolved parameters and derived paths for one run
//!
//! Built once at process start from CLI parameters, then shared read-only
//! across every task body.

use std::path::{Path, PathBuf};

use tracing::info;

/// Build id used when none is supplied (local developer runs)
pub const DEFAULT_BUILD_ID: &str = "local";

/// Branch name used when no git repository is found and no override is set
pub const NO_REPOSITORY_BRANCH: &str = "NO_GIT_REPOSITORY";

/// Container registry coordinates and credentials
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry server, e.g. `registry.example.com`
    pub server: String,
    /// Registry user name
    pub username: String,
    /// Registry password
    pub password: String,
    /// Whether remote image names are scoped under the user
    /// (`{server}/{user}/{name}` instead of `{server}/{name}`)
    pub user_scoped: bool,
}

/// Immutable context for one orchestration run
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Repository root
    pub root_dir: PathBuf,
    /// Branch being built (override, detected, or fallback)
    pub branch: String,
    /// Build identifier, defaults to [`DEFAULT_BUILD_ID`]
    pub build_id: String,
    /// Build number reported to the deploy tracker
    pub build_number: String,
    /// Override for derived image tags
    pub override_tags: Option<String>,
    /// Registry configuration, present when pushing/deploying
    pub registry: Option<RegistryConfig>,
    /// Runtime base image for web/API services
    pub webservice_runtime_image: String,
    /// Runtime base image for standard applications
    pub app_runtime_image: String,
    /// When set, external tool failures are logged and swallowed
    pub tolerate_errors: bool,
    /// Project base names excluded from the runnable set
    pub excluded_projects: Vec<String>,
}

impl BuildContext {
    /// Create a context with defaults for the given repository root.
    /// The branch is detected from git unless overridden later.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        let branch =
            detect_branch(&root_dir).unwrap_or_else(|| NO_REPOSITORY_BRANCH.to_string());
        Self {
            root_dir,
            branch,
            build_id: DEFAULT_BUILD_ID.to_string(),
            build_number: DEFAULT_BUILD_ID.to_string(),
            override_tags: None,
            registry: None,
            webservice_runtime_image: "mcr.microsoft.com/dotnet/aspnet:8.0".to_string(),
            app_runtime_image: "mcr.microsoft.com/dotnet/runtime:8.0".to_string(),
            tolerate_errors: false,
            excluded_projects: Vec::new(),
        }
    }

    /// Override the branch (takes precedence over git detection)
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Set the build identifier
    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = build_id.into();
        self
    }

    /// Set the build number
    pub fn with_build_number(mut self, build_number: impl Into<String>) -> Self {
        self.build_number = build_number.into();
        self
    }

    /// Override derived image tags
    pub fn with_override_tags(mut self, tags: Option<String>) -> Self {
        self.override_tags = tags;
        self
    }

    /// Set the registry configuration
    pub fn with_registry(mut self, registry: Option<RegistryConfig>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the error-tolerance policy
    pub fn with_tolerate_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_errors = tolerate;
        self
    }

    /// Whether the build id is still the local default
    pub fn is_default_build_id(&self) -> bool {
        self.build_id == DEFAULT_BUILD_ID
    }

    /// Source root containing the application projects
    pub fn source_dir(&self) -> PathBuf {
        self.root_dir.join("src")
    }

    /// Root containing the test projects
    pub fn tests_dir(&self) -> PathBuf {
        self.root_dir.join("tests")
    }

    /// Publish output directory; image builds run from here
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root_dir.join("_.artifacts")
    }

    /// Test result output directory
    pub fn tests_output_dir(&self) -> PathBuf {
        self.root_dir.join("_.testsOutput")
    }

    /// Root of the scoped configuration layers
    pub fn configs_dir(&self) -> PathBuf {
        self.root_dir.join("configs")
    }

    /// Directory holding the helm charts
    pub fn charts_dir(&self) -> PathBuf {
        self.root_dir.join("helm").join("charts")
    }

    /// The shared build recipe copied next to every published artifact
    pub fn dockerfile(&self) -> PathBuf {
        self.root_dir.join("docker").join("build.app.dockerfile")
    }

    /// Identifier baked into every image build:
    /// `{host}-{branch}-{utc timestamp}`
    pub fn build_run_id(&self) -> String {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let stamp = chrono::Utc::now().format("%Y-%m-%d-%H:%M:%S");
        format!("{}-{}-{}", host, self.branch, stamp)
    }

    /// Log the resolved context (the `show` task)
    pub fn show(&self) {
        info!("Branch : {}", self.branch);
        info!("BuildId : {}", self.build_id);
        info!("BuildNumber : {}", self.build_number);
        info!("RootDirectory : {}", self.root_dir.display());
        info!("ArtifactsDirectory : {}", self.artifacts_dir().display());
        info!("TestsOutputDirectory : {}", self.tests_output_dir().display());
        info!("ConfigsDirectory : {}", self.configs_dir().display());
        info!("ChartsDirectory : {}", self.charts_dir().display());
        info!("TolerateErrors : {}", self.tolerate_errors);
        info!(
            "RegistryServer : {}",
            self.registry
                .as_ref()
                .map(|r| r.server.as_str())
                .unwrap_or("-none-")
        );
    }
}

/// Resolve the current branch of the repository containing `root`,
/// if there is one.
pub fn detect_branch(root: &Path) -> Option<String> {
    let repo = git2::Repository::discover(root).ok()?;
    let head = repo.head().ok()?;
    head.shorthand().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_build_id() {
        let ctx = BuildContext::new("/tmp/repo");
        assert!(ctx.is_default_build_id());

        let ctx = ctx.with_build_id("2024.10.7");
        assert!(!ctx.is_default_build_id());
    }

    #[test]
    fn test_derived_paths() {
        let ctx = BuildContext::new("/repo");
        assert_eq!(ctx.source_dir(), PathBuf::from("/repo/src"));
        assert_eq!(ctx.tests_dir(), PathBuf::from("/repo/tests"));
        assert_eq!(ctx.artifacts_dir(), PathBuf::from("/repo/_.artifacts"));
        assert_eq!(ctx.configs_dir(), PathBuf::from("/repo/configs"));
        assert_eq!(ctx.charts_dir(), PathBuf::from("/repo/helm/charts"));
    }

    #[test]
    fn test_branch_override() {
        let ctx = BuildContext::new("/tmp/nonexistent-repo-path").with_branch("feature/x");
        assert_eq!(ctx.branch, "feature/x");
    }

    #[test]
    fn test_build_run_id_contains_branch() {
        let ctx = BuildContext::new("/tmp/nonexistent-repo-path").with_branch("main");
        assert!(ctx.build_run_id().contains("-main-"));
    }
}
