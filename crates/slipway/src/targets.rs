//! The static target graph
//!
//! Declared once at startup. Hard `depends_on` edges pull work in; the
//! release-ordering constraints between packaging, pushing and deploying
//! are `after` hints so each target stays individually invocable.

use anyhow::Context as _;
use tracing::{info, warn};

use slipway_core::ToolInvocation;
use slipway_images::ImagePipeline;
use slipway_notify::DeployTracker;
use slipway_releases::{ClusterContext, ReleaseInstaller};
use slipway_tasks::{GraphError, ParamCheck, TaskDefinition, TaskRegistry};

use crate::run_context::RunContext;

/// Build the target registry
pub fn build_registry() -> Result<TaskRegistry<RunContext>, GraphError> {
    let mut reg = TaskRegistry::new();

    reg.register(TaskDefinition::new("show").executes(|c: &RunContext| {
        c.build.show();
        Ok(())
    }))?;

    reg.register(
        TaskDefinition::new("clean-artifacts")
            .depends_on("show")
            .executes(clean_artifacts),
    )?;

    reg.register(TaskDefinition::new("clean-build").executes(clean_build))?;

    reg.register(TaskDefinition::new("restore").executes(|c: &RunContext| {
        c.runner()
            .exec(&ToolInvocation::new("dotnet").arg("restore").current_dir(&c.build.root_dir))?;
        Ok(())
    }))?;

    reg.register(TaskDefinition::new("compile").executes(|c: &RunContext| {
        c.runner()
            .exec(&ToolInvocation::new("dotnet").arg("build").current_dir(&c.build.root_dir))?;
        Ok(())
    }))?;

    reg.register(
        TaskDefinition::new("test")
            .depends_on("compile")
            .executes(run_tests),
    )?;

    reg.register(
        TaskDefinition::new("publish")
            .depends_on("clean-artifacts")
            .executes(publish),
    )?;

    reg.register(
        TaskDefinition::new("package")
            .depends_on("show")
            .after("publish")
            .executes(|c: &RunContext| {
                let projects = c.application_projects()?;
                ImagePipeline::new(&c.build).build(&projects)?;
                Ok(())
            }),
    )?;

    reg.register(
        TaskDefinition::new("push")
            .depends_on("show")
            .after("package")
            .requires(ParamCheck::new("registry-server", |c: &RunContext| {
                c.registry_server.is_some()
            }))
            .requires(ParamCheck::new("registry-user", |c: &RunContext| {
                c.registry_user.is_some()
            }))
            .requires(ParamCheck::new("registry-password", |c: &RunContext| {
                c.registry_password.is_some()
            }))
            .executes(push_images),
    )?;

    reg.register(
        TaskDefinition::new("clean-images")
            .depends_on("show")
            .after("package")
            .after("push")
            .executes(|c: &RunContext| {
                let projects = c.application_projects()?;
                ImagePipeline::new(&c.build).clean(&projects)?;
                Ok(())
            }),
    )?;

    reg.register(
        TaskDefinition::new("deploy")
            .depends_on("show")
            .after("push")
            .requires(ParamCheck::new("registry-server", |c: &RunContext| {
                c.registry_server.is_some()
            }))
            .requires(ParamCheck::new("kubeconfig", |c: &RunContext| {
                c.kubeconfig.is_some()
            }))
            .requires(ParamCheck::new("product", |c: &RunContext| {
                c.product.is_some()
            }))
            .requires(ParamCheck::new("environment", |c: &RunContext| {
                c.environment.is_some()
            }))
            .requires(ParamCheck::new("group", |c: &RunContext| c.group.is_some()))
            .only_when(|c: &RunContext| {
                !c.build.is_default_build_id() || c.build.override_tags.is_some()
            })
            .executes(deploy),
    )?;

    Ok(reg)
}

/// Reset the artifacts and test output directories
fn clean_artifacts(c: &RunContext) -> anyhow::Result<()> {
    for dir in [c.build.artifacts_dir(), c.build.tests_output_dir()] {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => info!(dir = %dir.display(), "removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).context(format!("failed to remove {}", dir.display())),
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Remove intermediate build output directories, best effort
fn clean_build(c: &RunContext) -> anyhow::Result<()> {
    for root in [c.build.source_dir(), c.build.tests_dir()] {
        for subdir in ["bin", "obj"] {
            let pattern = format!("{}/**/{}", root.display(), subdir);
            let Ok(paths) = glob::glob(&pattern) else {
                continue;
            };
            for path in paths.filter_map(|p| p.ok()).filter(|p| p.is_dir()) {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!(dir = %path.display(), "could not remove build output: {e}");
                }
            }
        }
    }
    Ok(())
}

/// Run every test project in parallel; all failures are reported together
fn run_tests(c: &RunContext) -> anyhow::Result<()> {
    let projects = c.test_projects()?;
    if projects.is_empty() {
        info!("no test projects found");
        return Ok(());
    }
    std::fs::create_dir_all(c.build.tests_output_dir())
        .context("failed to create test output directory")?;

    let runner = c.runner();
    let output_dir = c.build.tests_output_dir();
    slipway_tasks::run_all(
        &projects,
        |p| p.base_name(),
        |p| {
            let invocation = ToolInvocation::new("dotnet")
                .arg("test")
                .arg(p.path.to_string_lossy())
                .arg("--results-directory")
                .arg(output_dir.to_string_lossy())
                .args(["--logger", "trx"]);
            runner.exec(&invocation)?;
            Ok(())
        },
    )?;
    Ok(())
}

/// Publish every application into the artifacts directory, then prune
/// runtime payloads of platforms never deployed
fn publish(c: &RunContext) -> anyhow::Result<()> {
    let runner = c.runner();
    for project in c.application_projects()? {
        let output = c.build.artifacts_dir().join(project.base_name());
        let invocation = ToolInvocation::new("dotnet")
            .arg("publish")
            .arg(project.path.to_string_lossy())
            .args(["--configuration", "Release"])
            .arg("--output")
            .arg(output.to_string_lossy());
        runner.exec(&invocation)?;

        for pattern in ["runtimes/win*", "runtimes/osx*"] {
            let full = format!("{}/{}", output.display(), pattern);
            let Ok(paths) = glob::glob(&full) else {
                continue;
            };
            for path in paths.filter_map(|p| p.ok()) {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!(dir = %path.display(), "could not prune runtime payload: {e}");
                }
            }
        }
    }
    Ok(())
}

fn push_images(c: &RunContext) -> anyhow::Result<()> {
    let registry = c
        .build
        .registry
        .as_ref()
        .context("registry configuration is missing")?;
    let projects = c.application_projects()?;
    ImagePipeline::new(&c.build)
        .with_push_latest(c.push_latest)
        .push(&projects, registry)?;
    Ok(())
}

/// Install the release hierarchy of the selected group, then record each
/// app deployment with the tracker
fn deploy(c: &RunContext) -> anyhow::Result<()> {
    let kubeconfig = c.kubeconfig.as_ref().context("kubeconfig is missing")?;
    let product = c.product.as_deref().context("product is missing")?;
    let environment = c.environment.as_deref().context("environment is missing")?;
    let group = c.group.as_deref().context("group is missing")?;

    let cluster = ClusterContext::new(kubeconfig.as_path());
    let installer = ReleaseInstaller::new(&c.build, cluster, product, environment);

    installer.install_namespace(group)?;
    installer.install_product(group)?;
    installer.install_environment(group)?;
    installer.install_group(group)?;

    let projects = c.delivery_projects()?;
    for project in &projects {
        installer.install_app(group, project)?;
    }

    // Best effort: a missing tracker project or a transport failure must
    // never fail the deployment
    if let Some(token) = &c.tracker_token {
        let tracker = DeployTracker::new(token.as_str(), c.tracker_username.as_str());
        for project in &projects {
            tracker.notify(&project.short_name(), environment, &c.build.build_number);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_core::{BuildContext, ProjectLocator};
    use tempfile::TempDir;

    fn context(root: &TempDir) -> RunContext {
        RunContext {
            build: BuildContext::new(root.path()).with_branch("main"),
            locator: ProjectLocator::new(),
            product: None,
            environment: None,
            group: None,
            apps: Vec::new(),
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
    fn test_registry_builds() {
        let reg = build_registry().unwrap();
        assert!(reg.get("deploy").is_some());
        assert!(reg.get("push").is_some());
    }

    #[test]
    fn test_push_does_not_pull_in_package() {
        let reg = build_registry().unwrap();
        let plan = reg.plan("push").unwrap();
        assert!(plan.get("package").is_none());
        assert!(plan.get("show").is_some());
    }

    #[test]
    fn test_package_runs_after_publish_when_both_planned() {
        let reg = build_registry().unwrap();
        // publish is not a dependency of package, so planning package
        // alone leaves it out
        let plan = reg.plan("package").unwrap();
        assert!(plan.get("publish").is_none());
    }

    #[test]
    fn test_test_target_pulls_in_compile() {
        let reg = build_registry().unwrap();
        let plan = reg.plan("test").unwrap();
        assert!(plan.get("compile").is_some());
    }

    #[test]
    fn test_deploy_guard_skips_local_builds() {
        let root = TempDir::new().unwrap();
        let reg = build_registry().unwrap();
        let deploy = reg.get("deploy").unwrap();

        let local = context(&root);
        assert!(!deploy.should_run(&local));

        let mut with_id = context(&root);
        with_id.build = with_id.build.with_build_id("2024.10.7");
        assert!(deploy.should_run(&with_id));

        let mut with_override = context(&root);
        with_override.build = with_override.build.with_override_tags(Some("pinned".into()));
        assert!(deploy.should_run(&with_override));
    }

    #[test]
    fn test_deploy_requires_delivery_parameters() {
        let root = TempDir::new().unwrap();
        let reg = build_registry().unwrap();
        let deploy = reg.get("deploy").unwrap();
        let ctx = context(&root);

        let unsatisfied: Vec<&str> = deploy
            .requires
            .iter()
            .filter(|check| !check.is_satisfied(&ctx))
            .map(|check| check.name())
            .collect();
        assert_eq!(
            unsatisfied,
            vec!["registry-server", "kubeconfig", "product", "environment", "group"]
        );
    }

    #[test]
    fn test_clean_artifacts_resets_directories() {
        let root = TempDir::new().unwrap();
        let ctx = context(&root);
        let stale = ctx.build.artifacts_dir().join("Old.App");
        std::fs::create_dir_all(&stale).unwrap();

        clean_artifacts(&ctx).unwrap();
        assert!(ctx.build.artifacts_dir().exists());
        assert!(!stale.exists());
        assert!(ctx.build.tests_output_dir().exists());
    }

    #[test]
    fn test_clean_build_removes_bin_and_obj() {
        let root = TempDir::new().unwrap();
        let ctx = context(&root);
        let bin = ctx.build.source_dir().join("Orders.App").join("bin");
        let obj = ctx.build.source_dir().join("Orders.App").join("obj");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(&obj).unwrap();

        clean_build(&ctx).unwrap();
        assert!(!bin.exists());
        assert!(!obj.exists());
    }
}
