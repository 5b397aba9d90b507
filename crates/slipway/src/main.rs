//! Slipway - release orchestration CLI for containerized application groups

mod cli;
mod exit_codes;
mod run_context;
mod targets;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use cli::Cli;

fn main() {
    let _guard = init_tracing();

    let cli = Cli::parse();
    if let Err(e) = cli.execute() {
        cli::output::error(&format!("{e:#}"));
        std::process::exit(exit_code_for(&e));
    }
}

/// Map the failure onto the process exit code
fn exit_code_for(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<cli::commands::TasksFailed>().is_some() {
        exit_codes::TASK_FAILED
    } else if error.downcast_ref::<slipway_tasks::RunError>().is_some()
        || error.downcast_ref::<slipway_tasks::GraphError>().is_some()
    {
        exit_codes::CONFIG_ERROR
    } else if error
        .downcast_ref::<slipway_core::error::DiscoveryError>()
        .is_some()
    {
        exit_codes::DISCOVERY_ERROR
    } else {
        exit_codes::ERROR
    }
}

/// Set up tracing with two layers:
/// - Console: controlled by RUST_LOG (default: warn)
/// - File: always debug-level JSON to ~/.slipway/logs/
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(log_dir) = log_directory() {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "slipway.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_filter(console_filter),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_filter(EnvFilter::new("debug")),
            )
            .init();

        return Some(guard);
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(console_filter),
        )
        .init();

    None
}

/// Returns the log directory path, creating it if needed.
fn log_directory() -> Option<std::path::PathBuf> {
    let log_dir = dirs::home_dir()?.join(".slipway").join("logs");
    std::fs::create_dir_all(&log_dir).ok()?;
    Some(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cli::commands::TasksFailed;

    #[test]
    fn test_failed_tasks_exit_code() {
        let err: anyhow::Error = TasksFailed { count: 2 }.into();
        assert_eq!(exit_code_for(&err), exit_codes::TASK_FAILED);
    }

    #[test]
    fn test_graph_errors_are_config_errors() {
        let unknown: anyhow::Error =
            slipway_tasks::GraphError::TaskNotFound("nope".to_string()).into();
        assert_eq!(exit_code_for(&unknown), exit_codes::CONFIG_ERROR);

        let missing: anyhow::Error = slipway_tasks::RunError::MissingParameter {
            task: "push".to_string(),
            parameter: "registry-server".to_string(),
        }
        .into();
        assert_eq!(exit_code_for(&missing), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_discovery_error_exit_code() {
        let err: anyhow::Error = slipway_core::error::DiscoveryError::InvalidPattern {
            pattern: "[".to_string(),
            reason: "unclosed bracket".to_string(),
        }
        .into();
        assert_eq!(exit_code_for(&err), exit_codes::DISCOVERY_ERROR);
    }

    #[test]
    fn test_unclassified_errors_are_generic() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&err), exit_codes::ERROR);
    }
}
