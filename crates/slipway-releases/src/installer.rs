//! Release installation hierarchy
//!
//! A deployment walks five levels: namespace, product, environment, group
//! and finally one release per application. Every level follows the same
//! conventions for namespace, release name and values-file location, so
//! each level is a thin composition over [`HelmCommand`].

use std::path::PathBuf;

use tracing::{debug, info};

use slipway_core::error::{ConfigError, FingerprintError, ToolError};
use slipway_core::{hash_paths, BuildContext, ProjectRef, ToolRunner};
use slipway_images::ImageCoordinates;

use crate::charts::AppType;
use crate::cluster::ClusterContext;
use crate::helm::HelmCommand;

/// Caller hook applied to an app command after all computed values
pub type AppOverride = Box<dyn Fn(&ProjectRef, HelmCommand) -> HelmCommand + Send + Sync>;

/// Errors during release installation
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// A helm call failed
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The release could not be composed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The app's configuration could not be fingerprinted
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

/// Installs the release hierarchy of one application group
pub struct ReleaseInstaller<'a> {
    ctx: &'a BuildContext,
    cluster: ClusterContext,
    runner: ToolRunner,
    product: String,
    environment: String,
    app_override: Option<AppOverride>,
}

impl<'a> ReleaseInstaller<'a> {
    /// Create an installer for one product/environment pair on the
    /// given cluster
    pub fn new(
        ctx: &'a BuildContext,
        cluster: ClusterContext,
        product: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            cluster,
            runner: ToolRunner::new().with_tolerate_errors(ctx.tolerate_errors),
            product: product.into(),
            environment: environment.into(),
            app_override: None,
        }
    }

    /// Hook applied to every app command after the computed sets, so its
    /// values win over anything derived from the context
    pub fn with_app_override(mut self, hook: AppOverride) -> Self {
        self.app_override = Some(hook);
        self
    }

    /// Namespace of a group: `{product}-{group}`, lowercased
    pub fn namespace(&self, group: &str) -> String {
        format!("{}-{}", self.product, group).to_lowercase()
    }

    fn product_dir(&self) -> PathBuf {
        self.ctx.configs_dir().join(&self.product)
    }

    fn environment_dir(&self) -> PathBuf {
        self.product_dir().join(&self.environment)
    }

    fn group_dir(&self, group: &str) -> PathBuf {
        self.environment_dir().join("groups").join(group)
    }

    /// Compose one level of the hierarchy: shared chart, conventional
    /// release name, identity sets, plus the level's values file when it
    /// exists on disk.
    fn compose_level(
        &self,
        group: &str,
        suffix: &str,
        chart: &str,
        values: Option<PathBuf>,
    ) -> HelmCommand {
        let namespace = self.namespace(group);
        let mut cmd = HelmCommand::new(
            format!("{namespace}-{suffix}"),
            self.ctx.charts_dir().join(chart),
            namespace,
        );
        if let Some(path) = values {
            if path.exists() {
                cmd = cmd.values_file(path);
            } else {
                debug!(values = %path.display(), "no values file at conventional path");
            }
        }
        cmd.set("product", self.product.as_str())
            .set("environment", self.environment.as_str())
            .set("group", group)
    }

    /// The namespace-level command
    pub fn namespace_command(&self, group: &str) -> HelmCommand {
        self.compose_level(group, "namespace", "namespace", None)
    }

    /// The product-level command
    pub fn product_command(&self, group: &str) -> HelmCommand {
        self.compose_level(
            group,
            "product",
            "product",
            Some(self.product_dir().join("product.yaml")),
        )
    }

    /// The environment-level command
    pub fn environment_command(&self, group: &str) -> HelmCommand {
        self.compose_level(
            group,
            "environment",
            "environment",
            Some(self.environment_dir().join("environment.yaml")),
        )
    }

    /// The group-level command
    pub fn group_command(&self, group: &str) -> HelmCommand {
        self.compose_level(
            group,
            "group",
            "group",
            Some(self.group_dir(group).join("group.yaml")),
        )
    }

    /// The app-level command: image coordinates are injected here and
    /// nowhere else. An explicit chart path overrides the type-derived
    /// default; the caller override hook is applied last.
    pub fn app_command(
        &self,
        group: &str,
        project: &ProjectRef,
        chart_override: Option<PathBuf>,
    ) -> Result<HelmCommand, ReleaseError> {
        let chart = match chart_override {
            Some(path) => path,
            None => AppType::for_kind(project.kind)?.default_chart(&self.ctx.charts_dir()),
        };

        let app = project.short_name();
        let namespace = self.namespace(group);
        let coords = ImageCoordinates::for_project(self.ctx, project);
        let repository = match &self.ctx.registry {
            Some(registry) => coords.remote_repository(registry),
            None => coords.name.clone(),
        };

        let app_config_dir = self.group_dir(group).join(&app);
        let mut cmd = HelmCommand::new(
            format!("{}-{}", namespace, app.to_lowercase()),
            chart,
            namespace,
        );
        let values = app_config_dir.join("app.yaml");
        if values.exists() {
            cmd = cmd.values_file(values);
        } else {
            debug!(values = %values.display(), "no values file at conventional path");
        }
        cmd = cmd
            .set("product", self.product.as_str())
            .set("environment", self.environment.as_str())
            .set("group", group)
            .set("app", app.as_str())
            .set("image.repository", repository)
            .set("image.tag", coords.tag.as_str())
            .set("image.branch", self.ctx.branch.as_str());

        // A config change rolls the pods even when the image is unchanged
        if app_config_dir.is_dir() {
            cmd = cmd.set("configChecksum", hash_paths(&[&app_config_dir])?);
        }

        if let Some(hook) = &self.app_override {
            cmd = hook(project, cmd);
        }
        Ok(cmd)
    }

    fn install(&self, cmd: HelmCommand) -> Result<(), ReleaseError> {
        info!(release = cmd.release(), namespace = cmd.namespace(), "installing release");
        self.runner.exec(&cmd.to_invocation(&self.cluster))?;
        Ok(())
    }

    /// Install the namespace-level release of a group
    pub fn install_namespace(&self, group: &str) -> Result<(), ReleaseError> {
        self.install(self.namespace_command(group))
    }

    /// Install the product-level release into a group's namespace
    pub fn install_product(&self, group: &str) -> Result<(), ReleaseError> {
        self.install(self.product_command(group))
    }

    /// Install the environment-level release into a group's namespace
    pub fn install_environment(&self, group: &str) -> Result<(), ReleaseError> {
        self.install(self.environment_command(group))
    }

    /// Install the group-level release
    pub fn install_group(&self, group: &str) -> Result<(), ReleaseError> {
        self.install(self.group_command(group))
    }

    /// Install one application release with its type-derived chart
    pub fn install_app(&self, group: &str, project: &ProjectRef) -> Result<(), ReleaseError> {
        self.install(self.app_command(group, project, None)?)
    }

    /// Install one application release with the api chart
    pub fn install_api(&self, group: &str, project: &ProjectRef) -> Result<(), ReleaseError> {
        let chart = AppType::Api.default_chart(&self.ctx.charts_dir());
        self.install(self.app_command(group, project, Some(chart))?)
    }

    /// Install one application release with the worker chart
    pub fn install_worker(&self, group: &str, project: &ProjectRef) -> Result<(), ReleaseError> {
        let chart = AppType::Worker.default_chart(&self.ctx.charts_dir());
        self.install(self.app_command(group, project, Some(chart))?)
    }
}
