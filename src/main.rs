//! Binary entry point for the imageroller orchestrator.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use imageroller::{
    AuthConfig, FleetConfig, RackspaceProvider, RunReport, Scheduler, SchedulerError, Settings,
    TracingObserver, logging,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("logging setup failed: {0}")]
    Logging(#[from] logging::LoggingError),
    #[error(transparent)]
    Run(#[from] SchedulerError),
    #[error("failed to write status output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn execute(cli: Cli) -> Result<i32, CliError> {
    let settings = Settings::load_without_cli_args()
        .map_err(|err| CliError::Config(err.to_string()))?
        .with_overrides(cli.config, cli.auth_config, cli.log_level);
    settings
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    logging::init(&settings.log_level)?;

    let fleet = FleetConfig::load(settings.fleet_config_path(), cli.server.as_deref())
        .map_err(|err| CliError::Config(err.to_string()))?;
    let auth = AuthConfig::load(settings.auth_config_path())
        .map_err(|err| CliError::Config(err.to_string()))?;

    let provider = RackspaceProvider::with_timeout(&settings.identity_url, settings.http_timeout());
    let scheduler = Scheduler::new(provider, TracingObserver, fleet.concurrent_workers.get())?
        .with_poll_interval(settings.poll_interval())
        .with_force(cli.force);

    let report = scheduler.run(auth.credentials(), &fleet.servers).await?;
    write_report(io::stdout().lock(), &report)?;
    Ok(report.exit_code())
}

fn write_report(mut target: impl Write, report: &RunReport) -> io::Result<()> {
    for outcome in report.outcomes() {
        writeln!(target, "{outcome}")?;
    }
    writeln!(target, "{}", report.summary())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageroller::{Outcome, ProviderError};
    use rstest::rstest;

    #[rstest]
    fn report_lists_outcomes_then_summary() {
        let report = RunReport::new(vec![
            Outcome::success("web1", "created image img-1; pruned 1 stale image(s)"),
            Outcome::error("web2", "server 'web2' not found in region DFW"),
        ]);
        let mut buffer = Vec::new();

        write_report(&mut buffer, &report).unwrap_or_else(|err| panic!("write: {err}"));

        let rendered = String::from_utf8(buffer).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert_eq!(
            rendered,
            concat!(
                "web1: SUCCESS - created image img-1; pruned 1 stale image(s)\n",
                "web2: ERROR - server 'web2' not found in region DFW\n",
                "2 servers: 1 succeeded, 0 timed out, 1 failed\n",
            )
        );
    }

    #[rstest]
    fn authentication_failure_is_reported_once() {
        let err = CliError::Run(SchedulerError::Authentication(ProviderError::Auth {
            message: String::from("HTTP 401 Unauthorized"),
        }));
        let mut buffer = Vec::new();

        write_error(&mut buffer, &err);

        let rendered = String::from_utf8(buffer).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert_eq!(
            rendered,
            "run aborted: authentication failed: HTTP 401 Unauthorized\n"
        );
    }
}
