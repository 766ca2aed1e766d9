//! hpc-spool CLI - submit a render job file to the HPC cluster

use clap::Parser;
use hpcspool::config::{CliArgs, LogFormat, SpoolConfig};
use hpcspool::error::{Result, SpoolError};
use hpcspool::graph::TaskGraphBuilder;
use hpcspool::paths::{FallbackLookup, NetUseLookup, PathResolver, ShareLookup};
use hpcspool::scheduler::{
    DryRunScheduler, HpcPackCli, JobSubmitter, SchedulerClient, REQUIRED_SERVER_VERSION,
};
use hpcspool::spool::{SpoolOutcome, Spooler};
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            process::exit(4);
        }
    };

    init_logging(&args);
    tracing::info!("Starting hpc-spool for MS HPC v{}", REQUIRED_SERVER_VERSION);

    let config = match SpoolConfig::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            process::exit(4);
        }
    };

    let Some(job_file) = config.job_file.clone() else {
        tracing::error!("Must specify a job file.");
        tracing::info!("Exiting...");
        process::exit(3);
    };

    match run(&config, &job_file) {
        Ok(outcome) => {
            tracing::info!("Spooled '{}' ({}) as job {}", outcome.name, outcome.uuid, outcome.job_id);
        }
        Err(e) => {
            tracing::error!("{}", e);
            if e.is_recoverable() {
                tracing::info!("The head node may be down; submit again later.");
            }
            tracing::info!("Exiting...");
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(args: &CliArgs) {
    let debug_env = std::env::var("RRT_DEBUG").map(|v| !v.is_empty()).unwrap_or(false);
    let level = match args.verbose {
        0 if debug_env => "debug",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

fn run(config: &SpoolConfig, job_file: &Path) -> Result<SpoolOutcome> {
    tracing::info!("Spooling job from {}", job_file.display());

    let host = match (&config.head_node, config.dry_run) {
        (Some(host), _) => host.clone(),
        (None, true) => "dry-run".to_string(),
        (None, false) => return Err(SpoolError::MissingHeadNode),
    };

    let lookup = FallbackLookup::new(config.share_table(), config.use_net_use.then(NetUseLookup::new));
    let resolver = PathResolver::new(lookup).with_default_drive(&config.default_drive)?;
    let builder = TaskGraphBuilder::new(config.build_settings(), resolver);
    let settings = config.client_settings(&host);

    if config.dry_run {
        let client = SchedulerClient::new(DryRunScheduler::new(), settings);
        spool(config, builder, client, job_file)
    } else {
        let api = HpcPackCli::new().with_port(config.scheduler_port);
        spool(config, builder, SchedulerClient::new(api, settings), job_file)
    }
}

fn spool<L: ShareLookup, S: JobSubmitter>(
    config: &SpoolConfig,
    builder: TaskGraphBuilder<L>,
    submitter: S,
    job_file: &Path,
) -> Result<SpoolOutcome> {
    let mut spooler = Spooler::new(builder, submitter);
    if let Some(dir) = &config.audit_dir {
        spooler = spooler.with_audit_dir(dir.clone());
    }
    spooler.spool_file(job_file)
}
