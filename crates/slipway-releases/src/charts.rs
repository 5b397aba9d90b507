//! Chart selection
//!
//! Application releases use one of two shared charts depending on whether
//! the project serves traffic or only consumes work. An explicit chart
//! path always overrides the derived default.

use std::path::{Path, PathBuf};

use slipway_core::error::ConfigError;
use slipway_core::ProjectKind;

/// Deployment shape of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    /// Serves requests; gets a service and ingress
    Api,
    /// Background processor; no exposed endpoint
    Worker,
}

impl AppType {
    /// The shared chart for this application type
    pub fn default_chart(&self, charts_dir: &Path) -> PathBuf {
        match self {
            Self::Api => charts_dir.join("api"),
            Self::Worker => charts_dir.join("worker"),
        }
    }

    /// Derive the type from the project kind. Kinds that are not
    /// deployed have no chart; that is a hard configuration error.
    pub fn for_kind(kind: ProjectKind) -> Result<Self, ConfigError> {
        match kind {
            ProjectKind::WebService | ProjectKind::GraphQl => Ok(Self::Api),
            ProjectKind::App => Ok(Self::Worker),
            ProjectKind::Tests | ProjectKind::Package => {
                Err(ConfigError::NoChartForAppType(format!("{kind:?}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_charts() {
        let charts = Path::new("/repo/helm/charts");
        assert_eq!(
            AppType::Api.default_chart(charts),
            PathBuf::from("/repo/helm/charts/api")
        );
        assert_eq!(
            AppType::Worker.default_chart(charts),
            PathBuf::from("/repo/helm/charts/worker")
        );
    }

    #[test]
    fn test_type_from_kind() {
        assert_eq!(
            AppType::for_kind(ProjectKind::WebService).unwrap(),
            AppType::Api
        );
        assert_eq!(
            AppType::for_kind(ProjectKind::GraphQl).unwrap(),
            AppType::Api
        );
        assert_eq!(AppType::for_kind(ProjectKind::App).unwrap(), AppType::Worker);
    }

    #[test]
    fn test_undeployable_kind_has_no_chart() {
        assert!(matches!(
            AppType::for_kind(ProjectKind::Tests),
            Err(ConfigError::NoChartForAppType(_))
        ));
        assert!(matches!(
            AppType::for_kind(ProjectKind::Package),
            Err(ConfigError::NoChartForAppType(_))
        ));
    }
}
