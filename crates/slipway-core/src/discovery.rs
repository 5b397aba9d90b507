//! Project discovery and classification
//!
//! Scans a source tree for buildable units and classifies them by filename
//! suffix. Classification is injected as a strategy value so build variants
//! can swap the rules without subclassing anything.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::DiscoveryError;

/// Classification of a discovered project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    /// Standard runnable application (`*.App`)
    App,
    /// Web/API service (`*.WebService`, `*.RestAPI`)
    WebService,
    /// GraphQL service (`*.GraphQL`)
    GraphQl,
    /// Test project (`*.Tests`)
    Tests,
    /// Anything else under the source root: a library/package project
    Package,
}

impl ProjectKind {
    /// Whether projects of this kind get built into container images
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::App | Self::WebService | Self::GraphQl)
    }

    /// Whether this kind serves HTTP traffic (selects the runtime image)
    pub fn is_web_service(&self) -> bool {
        matches!(self, Self::WebService | Self::GraphQl)
    }
}

/// A discovered buildable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    /// Path to the project file
    pub path: PathBuf,
    /// Derived classification
    pub kind: ProjectKind,
}

impl ProjectRef {
    /// The project file name without its extension, e.g. `Foo.RestAPI`
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The application short name: the base name with a trailing `.App`
    /// stripped, e.g. `Foo.App` becomes `Foo`
    pub fn short_name(&self) -> String {
        let base = self.base_name();
        if base.to_lowercase().ends_with(".app") {
            base[..base.len() - 4].to_string()
        } else {
            base
        }
    }

    /// The directory containing the project file
    pub fn project_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Strategy for classifying a project path
pub trait Classifier: Send + Sync {
    /// Classify the given project file path
    fn classify(&self, path: &Path) -> ProjectKind;
}

/// Default classifier: a small set of filename-suffix rules, evaluated
/// case-insensitively against the file stem.
#[derive(Debug, Default)]
pub struct SuffixClassifier;

impl Classifier for SuffixClassifier {
    fn classify(&self, path: &Path) -> ProjectKind {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if stem.ends_with(".tests") {
            ProjectKind::Tests
        } else if stem.ends_with(".webservice") || stem.ends_with(".restapi") {
            ProjectKind::WebService
        } else if stem.ends_with(".graphql") {
            ProjectKind::GraphQl
        } else if stem.ends_with(".app") {
            ProjectKind::App
        } else {
            ProjectKind::Package
        }
    }
}

/// Discovers buildable units under a root directory
pub struct ProjectLocator {
    classifier: Arc<dyn Classifier>,
    deny_list: Vec<String>,
}

impl ProjectLocator {
    /// Create a locator with the default suffix rules
    pub fn new() -> Self {
        Self {
            classifier: Arc::new(SuffixClassifier),
            deny_list: Vec::new(),
        }
    }

    /// Replace the classification strategy
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Exclude projects from the runnable set by base name,
    /// matched case-insensitively
    pub fn with_deny_list<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny_list = names.into_iter().map(Into::into).collect();
        self
    }

    /// Find all projects matching `pattern` (a glob relative to `root`),
    /// ordered lexicographically by path. An empty result is not an error.
    pub fn find_projects(
        &self,
        root: &Path,
        pattern: &str,
    ) -> Result<Vec<ProjectRef>, DiscoveryError> {
        let full_pattern = root.join(pattern).to_string_lossy().into_owned();
        let paths = glob::glob(&full_pattern).map_err(|e| DiscoveryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let mut projects: Vec<ProjectRef> = paths
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .map(|path| {
                let kind = self.classifier.classify(&path);
                ProjectRef { path, kind }
            })
            .collect();
        projects.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(root = %root.display(), pattern, found = projects.len(), "discovered projects");
        Ok(projects)
    }

    /// Find the runnable applications (apps and services), with the
    /// deny-list applied
    pub fn application_projects(
        &self,
        root: &Path,
        pattern: &str,
    ) -> Result<Vec<ProjectRef>, DiscoveryError> {
        let projects = self
            .find_projects(root, pattern)?
            .into_iter()
            .filter(|p| p.kind.is_runnable() && !self.is_denied(p))
            .collect();
        Ok(projects)
    }

    /// Find the test projects under the tests root
    pub fn test_projects(
        &self,
        tests_root: &Path,
        pattern: &str,
    ) -> Result<Vec<ProjectRef>, DiscoveryError> {
        let projects = self
            .find_projects(tests_root, pattern)?
            .into_iter()
            .filter(|p| p.kind == ProjectKind::Tests)
            .collect();
        Ok(projects)
    }

    fn is_denied(&self, project: &ProjectRef) -> bool {
        let base = project.base_name();
        self.deny_list.iter().any(|d| d.eq_ignore_ascii_case(&base))
    }
}

impl Default for ProjectLocator {
    fn default() -> Self {
        Self::new()
    }
}
