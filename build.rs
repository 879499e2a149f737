//! Build script for generating the man pages of both binaries.
//!
//! Packaging picks the pages up from the build output directory.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

#[path = "src/cli/check.rs"]
mod check_cli;

use check_cli::CheckCli;
use cli::Cli;

fn render(command: clap::Command, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let page = format!("{}.1", command.get_name());
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;

    let mut file = File::create(out_dir.join(page))?;
    file.write_all(&buffer)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/check.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    render(Cli::command(), &out_dir)?;
    render(CheckCli::command(), &out_dir)?;
    Ok(())
}
