//! quoll - PBS job submission and query tool.

use camino::Utf8Path;
use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use quoll_cli::{Args, Command};
use quoll_core::{ModuleLoader, NullModuleLoader, PbsConf};
use quoll_pbs::{
    JobRequest, StatusFilter, StatusOutcome, SubmitContext, build_submit_command, fetch_status,
    query_flags,
};
use std::collections::BTreeMap;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let conf_path = args.pbs_conf.clone().unwrap_or_else(PbsConf::default_path);
    let conf = PbsConf::load(&conf_path).into_diagnostic()?;

    match args.command {
        Command::Submit {
            script,
            config,
            vars,
            dry_run,
        } => submit(&conf, &script, config.as_deref(), &vars, dry_run).await,
        Command::Status {
            job_id,
            projects,
            users,
            full,
        } => status(&conf, job_id, projects, users, full).await,
    }
}

async fn submit(
    conf: &PbsConf,
    script: &Utf8Path,
    config: Option<&Utf8Path>,
    vars: &[String],
    dry_run: bool,
) -> Result<()> {
    let request = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path).into_diagnostic()?;
            serde_json::from_str::<JobRequest>(&text).into_diagnostic()?
        }
        None => JobRequest::default(),
    };

    let vars = parse_vars(vars)?;
    let ctx = SubmitContext::from_env(conf).into_diagnostic()?;

    // PBS client tools may live behind an environment module.
    NullModuleLoader.load("pbs").into_diagnostic()?;

    let command = build_submit_command(&ctx, script, &request, &vars).into_diagnostic()?;

    if dry_run {
        println!("{command}");
        return Ok(());
    }

    tracing::info!("submitting: {}", command);
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .status()
        .await
        .into_diagnostic()?;
    if !status.success() {
        return Err(miette!("qsub exited with {status}"));
    }
    Ok(())
}

async fn status(
    conf: &PbsConf,
    job_id: Option<String>,
    projects: Vec<String>,
    users: Vec<String>,
    full: bool,
) -> Result<()> {
    let flags = query_flags(job_id.as_deref(), full);
    let filter = StatusFilter { projects, users };

    match fetch_status(conf, &flags, "Job Id", &filter).await {
        StatusOutcome::Ready(status) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&status).into_diagnostic()?
            );
            Ok(())
        }
        StatusOutcome::Unavailable => {
            // Non-fatal by contract: the queue may be briefly unreachable.
            eprintln!("quoll: job status unavailable");
            Ok(())
        }
    }
}

fn parse_vars(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| miette!("invalid --var {pair:?}, expected KEY=VALUE"))?;
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
