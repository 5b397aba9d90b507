//! Image build, push and cleanup pipeline
//!
//! All projects share one build recipe copied into the artifacts
//! directory; the project to bake is selected with build arguments. Only
//! projects whose publish output carries the deployability marker are
//! built.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use slipway_core::error::ToolError;
use slipway_core::{BuildContext, ProjectRef, RegistryConfig, ToolInvocation, ToolRunner};

use crate::naming::ImageCoordinates;

/// File a project directory must contain to be baked into an image
pub const DEPLOYABLE_MARKER: &str = "config.app.consts.yaml";

/// Errors of the image pipeline
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// An external docker call failed
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Copying the build recipe failed
    #[error("failed to copy build recipe to {path}")]
    Recipe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Builds, pushes and removes the container images of a build run
pub struct ImagePipeline<'a> {
    ctx: &'a BuildContext,
    runner: ToolRunner,
    push_latest: bool,
}

impl<'a> ImagePipeline<'a> {
    /// Create a pipeline; the error-tolerance policy follows the context
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self {
            ctx,
            runner: ToolRunner::new().with_tolerate_errors(ctx.tolerate_errors),
            push_latest: false,
        }
    }

    /// Also tag and push a `latest` alias for every pushed image
    pub fn with_push_latest(mut self, push_latest: bool) -> Self {
        self.push_latest = push_latest;
        self
    }

    /// Whether the project is marked deployable: the marker file sits
    /// next to the project file
    pub fn is_deployable(&self, project: &ProjectRef) -> bool {
        project.project_dir().join(DEPLOYABLE_MARKER).exists()
    }

    /// Copy the shared build recipe next to the publish outputs and
    /// return its new path
    pub fn prepare_recipe(&self) -> Result<PathBuf, ImageError> {
        let source = self.ctx.dockerfile();
        let file_name = source
            .file_name()
            .map(|n| n.to_owned())
            .unwrap_or_else(|| "build.app.dockerfile".into());
        let target = self.ctx.artifacts_dir().join(file_name);
        std::fs::copy(&source, &target).map_err(|e| ImageError::Recipe {
            path: target.clone(),
            source: e,
        })?;
        debug!(recipe = %target.display(), "build recipe staged");
        Ok(target)
    }

    /// Build one image per deployable project. Projects without the
    /// marker file are skipped with a warning.
    pub fn build(&self, projects: &[ProjectRef]) -> Result<(), ImageError> {
        let recipe = self.prepare_recipe()?;
        let build_run_id = self.ctx.build_run_id();

        for project in projects {
            if !self.is_deployable(project) {
                warn!(
                    project = %project.base_name(),
                    marker = DEPLOYABLE_MARKER,
                    "project has no deployability marker, skipping image"
                );
                continue;
            }

            let coords = ImageCoordinates::for_project(self.ctx, project);
            let runtime_image = if project.kind.is_web_service() {
                &self.ctx.webservice_runtime_image
            } else {
                &self.ctx.app_runtime_image
            };

            info!(image = %coords.local(), "building image");
            let invocation = ToolInvocation::new("docker")
                .arg("build")
                .arg("--force-rm")
                .arg("-f")
                .arg(recipe.to_string_lossy())
                .arg("--build-arg")
                .arg(format!("RUNTIME_IMAGE={runtime_image}"))
                .arg("--build-arg")
                .arg(format!("PROJECT_NAME={}", project.base_name()))
                .arg("--build-arg")
                .arg(format!("BUILD_RUN_ID={build_run_id}"))
                .arg("-t")
                .arg(coords.local())
                .arg(".")
                .current_dir(self.ctx.artifacts_dir());
            self.runner.exec(&invocation)?;
        }

        Ok(())
    }

    /// Push every deployable project's image to the registry: one login,
    /// then sequential tag and push per image.
    pub fn push(
        &self,
        projects: &[ProjectRef],
        registry: &RegistryConfig,
    ) -> Result<(), ImageError> {
        info!(server = %registry.server, "logging in to registry");
        let login = ToolInvocation::new("docker")
            .arg("login")
            .arg(registry.server.as_str())
            .arg("--username")
            .arg(registry.username.as_str())
            .arg("--password")
            .arg(registry.password.as_str());
        self.runner.exec(&login)?;

        for project in projects {
            if !self.is_deployable(project) {
                continue;
            }
            let coords = ImageCoordinates::for_project(self.ctx, project);
            let remote = coords.remote(registry);

            info!(image = %remote, "pushing image");
            self.runner.exec(
                &ToolInvocation::new("docker")
                    .arg("tag")
                    .arg(coords.local())
                    .arg(remote.as_str()),
            )?;
            self.runner
                .exec(&ToolInvocation::new("docker").arg("push").arg(remote.as_str()))?;

            if self.push_latest {
                let latest = coords.remote_latest(registry);
                self.runner.exec(
                    &ToolInvocation::new("docker")
                        .arg("tag")
                        .arg(coords.local())
                        .arg(latest.as_str()),
                )?;
                self.runner
                    .exec(&ToolInvocation::new("docker").arg("push").arg(latest.as_str()))?;
            }
        }

        Ok(())
    }

    /// Remove the local images of this build run. Images that were never
    /// built (or already removed) are not an error.
    pub fn clean(&self, projects: &[ProjectRef]) -> Result<(), ImageError> {
        for project in projects {
            let coords = ImageCoordinates::for_project(self.ctx, project);
            let invocation = ToolInvocation::new("docker")
                .arg("rmi")
                .arg("--force")
                .arg(coords.local());

            match self.runner.run(&invocation) {
                Ok(_) => info!(image = %coords.local(), "image removed"),
                Err(e) if is_missing_image(&e) => {
                    debug!(image = %coords.local(), "image not present, nothing to remove");
                }
                Err(e) => {
                    if self.runner.tolerates_errors() {
                        warn!(image = %coords.local(), "failed to remove image: {e}");
                    } else {
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Whether the failure is docker reporting an image that does not exist
fn is_missing_image(error: &ToolError) -> bool {
    matches!(
        error,
        ToolError::CommandFailed { stderr, .. } if stderr.contains("No such image")
    )
}
