//! Build parameters
//!
//! Every knob of a run comes in as a clap flag with an environment
//! fallback, so CI systems configure runs entirely through the
//! environment.

use std::path::PathBuf;

use clap::Args;

use slipway_core::{BuildContext, ProjectLocator, RegistryConfig};

use crate::run_context::RunContext;

/// Parameters shared by every target
#[derive(Debug, Args)]
pub struct BuildParams {
    /// Repository root (default: current directory)
    #[arg(long, env = "SLIPWAY_ROOT")]
    pub root: Option<PathBuf>,

    /// Branch being built (default: detected from git)
    #[arg(long, env = "SLIPWAY_BRANCH")]
    pub branch: Option<String>,

    /// Build identifier used as the image tag
    #[arg(long, env = "SLIPWAY_BUILD_ID")]
    pub build_id: Option<String>,

    /// Build number reported to the deploy tracker
    #[arg(long, env = "SLIPWAY_BUILD_NUMBER")]
    pub build_number: Option<String>,

    /// Override for derived image tags
    #[arg(long, env = "SLIPWAY_OVERRIDE_TAGS")]
    pub override_tags: Option<String>,

    /// Container registry server
    #[arg(long, env = "SLIPWAY_REGISTRY_SERVER")]
    pub registry_server: Option<String>,

    /// Container registry user
    #[arg(long, env = "SLIPWAY_REGISTRY_USER")]
    pub registry_user: Option<String>,

    /// Container registry password
    #[arg(long, env = "SLIPWAY_REGISTRY_PASSWORD", hide_env_values = true)]
    pub registry_password: Option<String>,

    /// Remote images live under `{server}/{user}/{name}`
    #[arg(long)]
    pub user_scoped_registry: bool,

    /// Runtime base image for web services
    #[arg(long, env = "SLIPWAY_WEBSERVICE_RUNTIME_IMAGE")]
    pub webservice_runtime_image: Option<String>,

    /// Runtime base image for standard applications
    #[arg(long, env = "SLIPWAY_APP_RUNTIME_IMAGE")]
    pub app_runtime_image: Option<String>,

    /// Log and swallow external tool failures instead of stopping
    #[arg(long, env = "SLIPWAY_TOLERATE_ERRORS")]
    pub tolerate_errors: bool,

    /// Exclude a project from the runnable set (can be repeated)
    #[arg(long = "exclude")]
    pub excluded: Vec<String>,

    /// Product the deployed group belongs to
    #[arg(long, env = "SLIPWAY_PRODUCT")]
    pub product: Option<String>,

    /// Target environment
    #[arg(long, env = "SLIPWAY_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Application group to deliver
    #[arg(long, env = "SLIPWAY_GROUP")]
    pub group: Option<String>,

    /// Deliver only this app (can be repeated; default: all runnable apps)
    #[arg(long = "app")]
    pub apps: Vec<String>,

    /// Kubeconfig of the target cluster
    #[arg(long, env = "SLIPWAY_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Account token of the deploy tracker
    #[arg(long, env = "SLIPWAY_TRACKER_TOKEN", hide_env_values = true)]
    pub tracker_token: Option<String>,

    /// User name reported to the deploy tracker
    #[arg(long, env = "SLIPWAY_TRACKER_USERNAME", default_value = "slipway")]
    pub tracker_username: String,

    /// Also push a `latest` alias for every image
    #[arg(long)]
    pub push_latest: bool,
}

impl BuildParams {
    /// Resolve the parameters into the run context
    pub fn resolve(&self) -> anyhow::Result<RunContext> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };

        let mut build = BuildContext::new(root)
            .with_override_tags(self.override_tags.clone())
            .with_tolerate_errors(self.tolerate_errors)
            .with_registry(self.registry());
        if let Some(branch) = &self.branch {
            build = build.with_branch(branch.clone());
        }
        if let Some(build_id) = &self.build_id {
            build = build.with_build_id(build_id.clone());
        }
        if let Some(build_number) = &self.build_number {
            build = build.with_build_number(build_number.clone());
        }
        if let Some(image) = &self.webservice_runtime_image {
            build.webservice_runtime_image = image.clone();
        }
        if let Some(image) = &self.app_runtime_image {
            build.app_runtime_image = image.clone();
        }
        build.excluded_projects = self.excluded.clone();

        Ok(RunContext {
            build,
            locator: ProjectLocator::new().with_deny_list(self.excluded.clone()),
            product: self.product.clone(),
            environment: self.environment.clone(),
            group: self.group.clone(),
            apps: self.apps.clone(),
            kubeconfig: self.kubeconfig.clone(),
            registry_server: self.registry_server.clone(),
            registry_user: self.registry_user.clone(),
            registry_password: self.registry_password.clone(),
            tracker_token: self.tracker_token.clone(),
            tracker_username: self.tracker_username.clone(),
            push_latest: self.push_latest,
        })
    }

    /// The registry configuration, present only when server, user and
    /// password are all given
    fn registry(&self) -> Option<RegistryConfig> {
        match (
            &self.registry_server,
            &self.registry_user,
            &self.registry_password,
        ) {
            (Some(server), Some(username), Some(password)) => Some(RegistryConfig {
                server: server.clone(),
                username: username.clone(),
                password: password.clone(),
                user_scoped: self.user_scoped_registry,
            }),
            _ => None,
        }
    }
}
