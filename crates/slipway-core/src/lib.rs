//! Slipway Core - shared building blocks for the deployment orchestrator
//!
//! This crate provides the build context, project discovery, content
//! fingerprinting, and the subprocess seam every external tool call
//! goes through.

pub mod context;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod fingerprint;

pub use context::{BuildContext, RegistryConfig, DEFAULT_BUILD_ID};
pub use discovery::{Classifier, ProjectKind, ProjectLocator, ProjectRef, SuffixClassifier};
pub use error::{Result, SlipwayError};
pub use exec::{ToolInvocation, ToolOutput, ToolRunner};
pub use fingerprint::hash_paths;
