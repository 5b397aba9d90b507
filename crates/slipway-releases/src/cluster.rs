//! Target cluster selection
//!
//! The kubeconfig path is carried as an immutable value and injected into
//! each helm invocation's environment. It is never written to the process
//! environment, so dropping the context after a deployment block leaves
//! nothing behind.

use std::path::{Path, PathBuf};

/// The cluster a deployment block targets
#[derive(Debug, Clone)]
pub struct ClusterContext {
    kubeconfig: PathBuf,
}

impl ClusterContext {
    /// Target the cluster described by the given kubeconfig file
    pub fn new(kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
        }
    }

    /// The kubeconfig path
    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    /// The environment variable to set on each tool call
    pub fn env(&self) -> (String, String) {
        (
            "KUBECONFIG".to_string(),
            self.kubeconfig.to_string_lossy().into_owned(),
        )
    }
}
