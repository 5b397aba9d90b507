//! Helm release installation
//!
//! Composes and runs the release hierarchy of an application group:
//! namespace, product, environment, group, then one release per app.

pub mod charts;
pub mod cluster;
pub mod helm;
pub mod installer;

pub use charts::AppType;
pub use cluster::ClusterContext;
pub use helm::HelmCommand;
pub use installer::{AppOverride, ReleaseError, ReleaseInstaller};
