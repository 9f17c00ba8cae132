//! CLI argument parsing and dispatch

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use scm_bridge::config::Config;
use scm_bridge::pipeline::{self, Outcome, Request};

/// Check out a git source reference or describe a project's packages
#[derive(Parser, Debug)]
#[command(name = "scm-bridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output directory: the checkout, or the manifests in project mode
    #[arg(long, value_name = "PATH")]
    outdir: PathBuf,

    /// Source reference: URL with optional ?subdir=, ?lfs= and #ref
    #[arg(long, value_name = "URL")]
    url: String,

    /// Emit one manifest pair per package instead of a checkout
    #[arg(long, value_name = "0|1", default_value = "0", action = clap::ArgAction::Set, value_parser = parse_switch)]
    projectmode: bool,

    /// Verbosity: 0 info, 1 debug, 2 trace
    #[arg(long, value_name = "LEVEL", default_value_t = 0)]
    debug: u8,

    /// Worker threads for package scanning
    #[arg(long, value_name = "N", env = "SCM_BRIDGE_JOBS")]
    jobs: Option<usize>,

    /// Abort git operations after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

/// Accept the numeric switches the build service passes as well as words.
fn parse_switch(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(format!("expected 0 or 1, got '{}'", other)),
    }
}

fn log_filter(debug: u8) -> &'static str {
    match debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(self.debug)))
            .format_timestamp(None)
            .init();

        let mut config = Config::from_env().with_timeout(self.timeout.map(Duration::from_secs));
        if let Some(jobs) = self.jobs {
            config = config.with_jobs(jobs);
        }
        debug!("{:?}", config);

        let request = Request {
            reference: self.url,
            outdir: self.outdir,
            project_mode: self.projectmode,
        };
        let outcome = pipeline::execute(&request, &config)
            .with_context(|| format!("Failed to resolve {}", request.reference))?;

        match outcome {
            Outcome::Checkout(result) => info!(
                "{} is at {}",
                result.working_tree_path.display(),
                result.head_commit
            ),
            Outcome::Project { packages, .. } => {
                info!("Described {} packages in {}", packages.len(), request.outdir.display())
            }
        }
        Ok(())
    }
}
