//! Nagios-style plugin reporting how stale a server's newest image is.
//!
//! Prints one `STATUS - message` line and exits with the plugin status code.

use std::io::{self, Write as _};
use std::process;
use std::time::Duration;

use clap::Parser;
use imageroller::check::{CheckReport, Thresholds, run_check};
use imageroller::{Credentials, RackspaceProvider};

#[path = "../cli/check.rs"]
mod check_cli;

use check_cli::CheckCli;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let cli = CheckCli::parse();
    let report = check(cli).await;
    writeln!(io::stdout(), "{report}").ok();
    process::exit(report.status.exit_code());
}

async fn check(cli: CheckCli) -> CheckReport {
    let thresholds = match Thresholds::from_hours(cli.warning_hours, cli.critical_hours) {
        Ok(thresholds) => thresholds,
        Err(err) => return CheckReport::unknown(&err),
    };
    let provider = RackspaceProvider::with_timeout(cli.identity_url, HTTP_TIMEOUT);
    let credentials = Credentials::new(cli.auth_user, cli.auth_key);

    run_check(&provider, &credentials, &cli.server, &cli.region, thresholds)
        .await
        .unwrap_or_else(|err| CheckReport::unknown(&err))
}
