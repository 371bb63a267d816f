mod config;

use clap::{Parser, Subcommand};
use config::{Config, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(version, about = "Tenant metering query API")]
struct Cli {
    #[arg(long)]
    config_file_path: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the metering API and its admin endpoints
    MeteringApi,
    /// Load and validate the config file, then exit
    ValidateConfig,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("metering_api section missing from config")]
    MissingSection,
    #[error("invalid config: {0}")]
    Validation(#[from] metering_api::config::ValidationError),
    #[error(transparent)]
    MeteringApi(#[from] metering_api::MeteringApiError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", cli.config_file_path.display());
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the runtime starts.
    let _sentry = init_logging(&config.common.logging);

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "metering exited with error");
            ExitCode::FAILURE
        }
    }
}

fn run(command: CliCommand, config: Config) -> Result<(), CliError> {
    let api_config = config.metering_api.ok_or(CliError::MissingSection)?;

    match command {
        CliCommand::ValidateConfig => {
            api_config.validate()?;
            tracing::info!("config is valid");
            Ok(())
        }
        CliCommand::MeteringApi => {
            if let Some(metrics) = &config.common.metrics {
                init_metrics(metrics)?;
            }

            tracing::info!("Starting metering api");
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(metering_api::run(api_config))?;
            Ok(())
        }
    }
}

fn init_logging(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(&config.prefix))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(metering_api::metrics_defs::ALL_METRICS);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_subcommand() {
        let cli = Cli::parse_from([
            "metering",
            "--config-file-path",
            "/etc/metering.yaml",
            "validate-config",
        ]);
        assert_eq!(cli.config_file_path, PathBuf::from("/etc/metering.yaml"));
        assert!(matches!(cli.command, CliCommand::ValidateConfig));
    }

    #[test]
    fn run_requires_metering_api_section() {
        let config = Config {
            common: config::CommonConfig {
                metrics: None,
                logging: LoggingConfig::default(),
            },
            metering_api: None,
        };
        let err = run(CliCommand::ValidateConfig, config).expect_err("missing section");
        assert!(matches!(err, CliError::MissingSection));
    }
}
