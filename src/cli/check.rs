//! Command-line interface for the `imageroller-check` monitoring plugin.
//!
//! Kept apart from the main CLI so the plugin binary and the build script can
//! include it on its own.

use clap::Parser;

/// Arguments for the freshness check.
#[derive(Debug, Parser)]
#[command(
    name = "imageroller-check",
    about = "Report how old a server's newest image is, Nagios style",
    version
)]
pub(crate) struct CheckCli {
    /// Server name to inspect.
    #[arg(long, value_name = "NAME")]
    pub(crate) server: String,
    /// Region the server lives in.
    #[arg(long, value_name = "REGION")]
    pub(crate) region: String,
    /// Age in hours at which the check reports WARNING.
    #[arg(long, value_name = "HOURS")]
    pub(crate) warning_hours: u64,
    /// Age in hours at which the check reports CRITICAL.
    #[arg(long, value_name = "HOURS")]
    pub(crate) critical_hours: u64,
    /// API user name.
    #[arg(long, env = "IMAGEROLLER_AUTH_USER", value_name = "USER")]
    pub(crate) auth_user: String,
    /// API key.
    #[arg(long, env = "IMAGEROLLER_AUTH_KEY", value_name = "KEY", hide_env_values = true)]
    pub(crate) auth_key: String,
    /// Identity service token endpoint.
    #[arg(
        long,
        env = "IMAGEROLLER_IDENTITY_URL",
        value_name = "URL",
        default_value = "https://identity.api.rackspacecloud.com/v2.0/tokens"
    )]
    pub(crate) identity_url: String,
}
