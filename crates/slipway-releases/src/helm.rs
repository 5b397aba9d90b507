//! Helm command composition
//!
//! A [`HelmCommand`] is a value describing one `helm upgrade --install`
//! call. Value sources compose in a fixed precedence order, low to high:
//! cluster environment, convention values files, explicit `--set` pairs,
//! then a caller override applied last. Helm resolves repeated `--set`
//! keys in favor of the later occurrence, so appending is enough to win.

use std::path::{Path, PathBuf};

use slipway_core::ToolInvocation;

use crate::cluster::ClusterContext;

/// One helm release installation, composed before anything is spawned
#[derive(Debug, Clone)]
pub struct HelmCommand {
    release: String,
    chart: PathBuf,
    namespace: String,
    values_files: Vec<PathBuf>,
    sets: Vec<(String, String)>,
}

impl HelmCommand {
    /// Describe an installation of `chart` as `release` into `namespace`
    pub fn new(
        release: impl Into<String>,
        chart: impl Into<PathBuf>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            release: release.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            values_files: Vec::new(),
            sets: Vec::new(),
        }
    }

    /// Append a values file; later files override earlier ones
    pub fn values_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.values_files.push(path.into());
        self
    }

    /// Append one `--set` pair; later pairs override earlier ones
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.sets.push((key.into(), value.into()));
        self
    }

    /// The release name
    pub fn release(&self) -> &str {
        &self.release
    }

    /// The target namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The chart being installed
    pub fn chart(&self) -> &Path {
        &self.chart
    }

    /// The `--set` pairs in application order
    pub fn sets(&self) -> &[(String, String)] {
        &self.sets
    }

    /// Render the command as a tool invocation against the given cluster
    pub fn to_invocation(&self, cluster: &ClusterContext) -> ToolInvocation {
        let mut invocation = ToolInvocation::new("helm")
            .arg("upgrade")
            .arg("--install")
            .arg(self.release.as_str())
            .arg(self.chart.to_string_lossy())
            .arg("--namespace")
            .arg(self.namespace.as_str())
            .arg("--create-namespace");

        for file in &self.values_files {
            invocation = invocation.arg("-f").arg(file.to_string_lossy());
        }
        for (key, value) in &self.sets {
            invocation = invocation.arg("--set").arg(format!("{key}={value}"));
        }

        let (key, value) = cluster.env();
        invocation.env(key, value)
    }
}
