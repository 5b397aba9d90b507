//! Deploy notification client
//!
//! Records each application deployment with the error tracker so crash
//! reports can be attributed to a release. Notification is best effort:
//! a missing project or a transport failure is logged and never fails
//! the deployment.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Default tracker API root
pub const DEFAULT_BASE_URL: &str = "https://api.rollbar.com/api/1";

/// Token scope required to record a deploy
const DEPLOY_SCOPE: &str = "post_server_item";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
    #[serde(default)]
    scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DeployRecord<'a> {
    access_token: &'a str,
    environment: &'a str,
    revision: &'a str,
    rollbar_username: &'a str,
    local_username: &'a str,
}

#[derive(Debug, thiserror::Error)]
enum NotifyError {
    #[error("tracker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no tracker project named '{0}'")]
    ProjectNotFound(String),

    #[error("project '{0}' has no '{DEPLOY_SCOPE}' token")]
    TokenNotFound(String),
}

/// Records deployments against the tracker's deploy API
pub struct DeployTracker {
    client: reqwest::blocking::Client,
    base_url: String,
    account_token: String,
    username: String,
}

impl DeployTracker {
    /// Create a tracker client using an account-level read token
    pub fn new(account_token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            account_token: account_token.into(),
            username: username.into(),
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Record a deployment of `app` to `environment` at `revision`.
    /// Never fails: lookup misses and transport errors are logged and
    /// swallowed.
    pub fn notify(&self, app: &str, environment: &str, revision: &str) {
        match self.try_notify(app, environment, revision) {
            Ok(()) => info!(app, environment, revision, "deploy recorded"),
            Err(e @ NotifyError::Transport(_)) => {
                error!(app, "failed to record deploy: {e}");
            }
            Err(e) => warn!(app, "deploy not recorded: {e}"),
        }
    }

    fn try_notify(&self, app: &str, environment: &str, revision: &str) -> Result<(), NotifyError> {
        let projects: ApiResponse<Vec<Project>> = self
            .client
            .get(format!("{}/projects", self.base_url))
            .query(&[("access_token", self.account_token.as_str())])
            .send()?
            .error_for_status()?
            .json()?;

        let project = find_project(&projects.result, app)
            .ok_or_else(|| NotifyError::ProjectNotFound(app.to_string()))?;
        debug!(app, project_id = project.id, "tracker project resolved");

        let tokens: ApiResponse<Vec<AccessToken>> = self
            .client
            .get(format!(
                "{}/project/{}/access_tokens",
                self.base_url, project.id
            ))
            .query(&[("access_token", self.account_token.as_str())])
            .send()?
            .error_for_status()?
            .json()?;

        let token = find_deploy_token(&tokens.result)
            .ok_or_else(|| NotifyError::TokenNotFound(app.to_string()))?;

        let local_username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        self.client
            .post(format!("{}/deploy/", self.base_url))
            .json(&DeployRecord {
                access_token: &token.access_token,
                environment,
                revision,
                rollbar_username: &self.username,
                local_username: &local_username,
            })
            .send()?
            .error_for_status()?;

        Ok(())
    }
}

/// Find a project by name, case-insensitively
fn find_project<'a>(projects: &'a [Project], name: &str) -> Option<&'a Project> {
    projects.iter().find(|p| {
        p.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    })
}

/// Find a token carrying the deploy scope
fn find_deploy_token(tokens: &[AccessToken]) -> Option<&AccessToken> {
    tokens
        .iter()
        .find(|t| t.scopes.iter().any(|s| s == DEPLOY_SCOPE))
}
