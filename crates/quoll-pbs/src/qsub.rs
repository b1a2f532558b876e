//! Build qsub submission commands.

use crate::mounts::{DEFAULT_MOUNTS, find_mounts, storage_token};
use crate::types::{JobRequest, SubmitContext};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// PBSPro truncates job names beyond this length.
const JOBNAME_LIMIT: usize = 15;

const JOIN_MODES: [&str; 3] = ["oe", "eo", "n"];

/// Variable consulted for resolving relative script paths.
const HOME_VAR: &str = "QUOLL_PATH";

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Unknown qsub IO stream join setting {0:?} (expected oe, eo, or n)")]
    InvalidJoin(String),
    #[error("No project configured and PROJECT is unset")]
    NoProject,
    #[error("Job script not found: {0}")]
    ScriptNotFound(Utf8PathBuf),
}

/// Assemble the full qsub invocation for a job script.
///
/// Only a string is produced; nothing is executed here. The script path is
/// resolved first, and storage tokens from the request's storage map and
/// from scanning the interpreter and script paths are all collected before
/// the single `-l storage` flag is emitted.
pub fn build_submit_command(
    ctx: &SubmitContext,
    script: &Utf8Path,
    request: &JobRequest,
    vars: &BTreeMap<String, String>,
) -> Result<String, SubmitError> {
    let script = resolve_script(ctx, script, vars)?;

    let mut flags: Vec<String> = Vec::new();

    let queue = request.queue.as_deref().unwrap_or("normal");
    flags.push(format!("-q {queue}"));

    let project = request
        .project
        .as_deref()
        .or(ctx.project.as_deref())
        .ok_or(SubmitError::NoProject)?;
    flags.push(format!("-P {project}"));

    // One -l flag per resource, in fixed order.
    let resources = [
        ("walltime", request.walltime.clone()),
        ("ncpus", request.ncpus.map(|n| n.to_string())),
        ("mem", request.mem.clone()),
        ("jobfs", request.jobfs.clone()),
    ];
    for (key, value) in resources {
        if let Some(value) = value {
            flags.push(format!("-l {key}={value}"));
        }
    }

    let jobname = match request.jobname.clone() {
        Some(name) => name,
        None => default_jobname(),
    };
    if !jobname.is_empty() {
        let truncated: String = jobname.chars().take(JOBNAME_LIMIT).collect();
        flags.push(format!("-N {truncated}"));
    }

    if let Some(priority) = request.priority {
        flags.push(format!("-p {priority}"));
    }

    // Run the job from its submission directory.
    flags.push("-l wd".to_string());

    let join = request.join.as_deref().unwrap_or("n");
    if !JOIN_MODES.contains(&join) {
        return Err(SubmitError::InvalidJoin(join.to_string()));
    }
    flags.push(format!("-j {join}"));

    // Always emitted, even with nothing to pass.
    let vstring = vars
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    flags.push(format!("-v {vstring}"));

    let storages = collect_storage_tokens(ctx, &script, request);
    if !storages.is_empty() {
        let joined = storages.into_iter().collect::<Vec<_>>().join("+");
        flags.push(format!("-l storage={joined}"));
    }

    if let Some(extra) = request.qsub_flags.as_deref() {
        flags.push(extra.to_string());
    }

    Ok(format!(
        "qsub {} -- {} {}",
        flags.join(" "),
        ctx.interpreter,
        script
    ))
}

/// Storage tokens for the `-l storage` flag: configured mount/project
/// pairs, plus mounts discovered under the interpreter and script paths.
fn collect_storage_tokens(
    ctx: &SubmitContext,
    script: &Utf8Path,
    request: &JobRequest,
) -> BTreeSet<String> {
    let mut mounts: BTreeSet<String> = DEFAULT_MOUNTS.iter().map(|m| m.to_string()).collect();
    let mut storages = BTreeSet::new();

    for (mount, projects) in &request.storage {
        mounts.insert(mount.clone());
        for project in projects {
            storages.insert(storage_token(mount, project));
        }
    }

    storages.extend(find_mounts(&[ctx.interpreter.as_path(), script], &mounts));
    storages
}

/// Resolve a relative script against QUOLL_PATH or the tool's own bin
/// directory; the resolved file must exist. Absolute paths pass through.
fn resolve_script(
    ctx: &SubmitContext,
    script: &Utf8Path,
    vars: &BTreeMap<String, String>,
) -> Result<Utf8PathBuf, SubmitError> {
    if script.is_absolute() {
        return Ok(script.to_owned());
    }

    let home = vars
        .get(HOME_VAR)
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| ctx.bin_dir.clone());
    let resolved = home.join(script);

    if !resolved.is_file() {
        return Err(SubmitError::ScriptNotFound(resolved));
    }
    Ok(resolved)
}

fn default_jobname() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}
