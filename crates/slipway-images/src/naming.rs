//! Image naming conventions
//!
//! Names and tags are pure functions of the build context so that every
//! stage (build, push, clean, deploy) derives identical coordinates.

use slipway_core::{BuildContext, ProjectRef, RegistryConfig};

/// Local name and tag of one project's image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCoordinates {
    /// Image name: `{short_name}-{branch}`, lowercased, branch slashes removed
    pub name: String,
    /// Image tag: the override tag when set, otherwise the build id, lowercased
    pub tag: String,
}

impl ImageCoordinates {
    /// Derive the coordinates for a project under the given context
    pub fn for_project(ctx: &BuildContext, project: &ProjectRef) -> Self {
        Self {
            name: image_name(&project.short_name(), &ctx.branch),
            tag: tag_name(ctx.override_tags.as_deref(), &ctx.build_id),
        }
    }

    /// The local `name:tag` reference
    pub fn local(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }

    /// The remote reference on the given registry. User-scoped registries
    /// nest the image under the user name.
    pub fn remote(&self, registry: &RegistryConfig) -> String {
        if registry.user_scoped {
            format!(
                "{}/{}/{}:{}",
                registry.server, registry.username, self.name, self.tag
            )
        } else {
            format!("{}/{}:{}", registry.server, self.name, self.tag)
        }
    }

    /// The remote repository without a tag, as charts reference it
    pub fn remote_repository(&self, registry: &RegistryConfig) -> String {
        if registry.user_scoped {
            format!("{}/{}/{}", registry.server, registry.username, self.name)
        } else {
            format!("{}/{}", registry.server, self.name)
        }
    }

    /// The remote reference with the tag replaced by `latest`
    pub fn remote_latest(&self, registry: &RegistryConfig) -> String {
        if registry.user_scoped {
            format!(
                "{}/{}/{}:latest",
                registry.server, registry.username, self.name
            )
        } else {
            format!("{}/{}:latest", registry.server, self.name)
        }
    }
}

/// `{short_name}-{branch}` with slashes stripped from the branch, lowercased
pub fn image_name(short_name: &str, branch: &str) -> String {
    format!("{}-{}", short_name, branch.replace('/', "")).to_lowercase()
}

/// The override tag when present, otherwise the build id, lowercased
pub fn tag_name(override_tag: Option<&str>, build_id: &str) -> String {
    override_tag.unwrap_or(build_id).to_lowercase()
}
