//! Query PBS job status via qstat.

use quoll_core::PbsConf;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

/// Job ID -> attribute name -> attribute value.
pub type StatusMap = BTreeMap<String, BTreeMap<String, String>>;

/// Wall-clock budget for retrying a failed qstat call.
pub const RETRY_BUDGET: Duration = Duration::from_secs(10);

/// Pause between retry attempts.
const RETRY_PAUSE: Duration = Duration::from_millis(250);

/// Outcome of a status query.
///
/// `Unavailable` means the query itself kept failing for the whole retry
/// budget; an empty `Ready` map means qstat answered but reported no
/// matching jobs. Callers should treat both as non-fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Ready(StatusMap),
    Unavailable,
}

impl StatusOutcome {
    pub fn into_map(self) -> Option<StatusMap> {
        match self {
            StatusOutcome::Ready(map) => Some(map),
            StatusOutcome::Unavailable => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum QstatError {
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("{command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

/// Project/user filter over status blocks.
///
/// An empty filter retains everything. Otherwise a block survives if its
/// `project` matches any listed project or its `Job_Owner` matches any
/// listed user.
#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    pub projects: Vec<String>,
    pub users: Vec<String>,
}

impl StatusFilter {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.users.is_empty()
    }

    fn retains(&self, block: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        self.projects
            .iter()
            .any(|p| block.contains(&format!("project = {p}")))
            || self
                .users
                .iter()
                .any(|u| block.contains(&format!("Job_Owner = {u}")))
    }
}

/// Parse qstat full output into per-job attribute maps.
///
/// Blocks are introduced by `"<header>: "`. The first line of a block is
/// the job key, truncated at the first `.` to drop the server suffix
/// (`123.r-man2` -> `123`). Body lines are `key = value` pairs; a newline
/// followed by a tab continues the previous line. Lines without `=` are
/// skipped.
pub fn parse_status(output: &str, header: &str, filter: &StatusFilter) -> StatusMap {
    let separator = format!("{header}: ");
    let mut status = StatusMap::new();

    for block in output.split(&separator) {
        if block.is_empty() || !filter.retains(block) {
            continue;
        }

        let (first, body) = block.split_once('\n').unwrap_or((block, ""));
        let key = first.trim().split('.').next().unwrap_or_default();
        if key.is_empty() {
            continue;
        }

        let body = body.replace("\n\t", "");
        let mut attrs = BTreeMap::new();
        for line in body.lines() {
            if let Some((name, value)) = line.split_once('=') {
                attrs.insert(name.trim().to_string(), value.trim().to_string());
            }
        }

        status.insert(key.to_string(), attrs);
    }

    status
}

/// Query job status with the default retry budget.
pub async fn fetch_status(
    conf: &PbsConf,
    flags: &[String],
    header: &str,
    filter: &StatusFilter,
) -> StatusOutcome {
    fetch_status_within(conf, flags, header, filter, RETRY_BUDGET).await
}

/// Query job status, retrying failures within an explicit budget.
///
/// Never returns an error: when qstat keeps failing until the budget runs
/// out, the outcome degrades to `Unavailable`.
pub async fn fetch_status_within(
    conf: &PbsConf,
    flags: &[String],
    header: &str,
    filter: &StatusFilter,
    budget: Duration,
) -> StatusOutcome {
    let deadline = Instant::now() + budget;

    loop {
        match run_qstat(conf, flags).await {
            Ok(output) => return StatusOutcome::Ready(parse_status(&output, header, filter)),
            Err(e) => {
                if Instant::now() >= deadline {
                    tracing::warn!("qstat unavailable after {:?}: {}", budget, e);
                    return StatusOutcome::Unavailable;
                }
                tracing::debug!("qstat failed, retrying: {}", e);
                tokio::time::sleep(RETRY_PAUSE).await;
            }
        }
    }
}

async fn run_qstat(conf: &PbsConf, flags: &[String]) -> Result<String, QstatError> {
    let qstat = conf.qstat_path().map_err(|e| QstatError::Execution {
        command: "qstat".to_string(),
        error: e.to_string(),
    })?;

    let output = Command::new(qstat.as_str())
        .args(flags)
        .output()
        .await
        .map_err(|e| QstatError::Execution {
            command: qstat.to_string(),
            error: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(QstatError::Failed {
            command: qstat.to_string(),
            stderr: stderr.to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// qstat flags for a status query: block display, array subjob expansion
/// when `full`, then the job ID when one is given.
pub fn query_flags(job_id: Option<&str>, full: bool) -> Vec<String> {
    let mut flags = vec![if full { "-ft" } else { "-f" }.to_string()];
    if let Some(id) = job_id {
        flags.push(id.to_string());
    }
    flags
}

/// PBS job ID of the current process, from `PBS_JOBID`.
///
/// With `short` the server suffix after the first `.` is dropped.
pub fn job_id_from_env(short: bool) -> Option<String> {
    let jobid = std::env::var("PBS_JOBID").ok()?;
    if jobid.is_empty() {
        return None;
    }
    if short {
        Some(short_id(&jobid).to_string())
    } else {
        Some(jobid)
    }
}

fn short_id(jobid: &str) -> &str {
    jobid.split('.').next().unwrap_or(jobid)
}

/// Attributes of the job this process is running inside, if any.
///
/// Returns `None` outside a PBS job, when the job has no record, or when
/// the query subsystem is unavailable.
pub async fn fetch_job_info(conf: &PbsConf) -> Option<BTreeMap<String, String>> {
    let jobid = job_id_from_env(true)?;
    let flags = query_flags(Some(&jobid), true);

    match fetch_status(conf, &flags, "Job Id", &StatusFilter::default()).await {
        StatusOutcome::Ready(status) => extract_job_info(status, jobid),
        StatusOutcome::Unavailable => None,
    }
}

/// Pull one job's attributes out of a status map, adding its own ID under
/// `Job_ID` alongside the attributes qstat reported.
fn extract_job_info(mut status: StatusMap, jobid: String) -> Option<BTreeMap<String, String>> {
    let mut attrs = status.remove(&jobid)?;
    attrs.insert("Job_ID".to_string(), jobid);
    Some(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    #[test]
    fn test_parse_single_block() {
        let output = "Job Id: 123.r-man2\n    project = ab12\n    Job_Owner = alice\n";
        let status = parse_status(output, "Job Id", &StatusFilter::default());

        let attrs = &status["123"];
        assert_eq!(attrs["project"], "ab12");
        assert_eq!(attrs["Job_Owner"], "alice");
    }

    #[test]
    fn test_parse_key_without_server_suffix() {
        let output = "Job Id: 42\n    queue = normal\n";
        let status = parse_status(output, "Job Id", &StatusFilter::default());
        assert_eq!(status["42"]["queue"], "normal");
    }

    #[test]
    fn test_parse_joins_continuation_lines() {
        let output = "Job Id: 77.srv\n    Variable_List = PROJECT=ab12,\n\tSHELL=/bin/bash\n";
        let status = parse_status(output, "Job Id", &StatusFilter::default());
        assert_eq!(status["77"]["Variable_List"], "PROJECT=ab12,SHELL=/bin/bash");
    }

    #[test]
    fn test_parse_skips_lines_without_equals() {
        let output = "Job Id: 9.srv\n    queue = normal\n\n    stray line\n";
        let status = parse_status(output, "Job Id", &StatusFilter::default());
        assert_eq!(status["9"].len(), 1);
    }

    #[test]
    fn test_parse_multiple_blocks() {
        let output = "Job Id: 1.srv\n    queue = normal\nJob Id: 2.srv\n    queue = express\n";
        let status = parse_status(output, "Job Id", &StatusFilter::default());
        assert_eq!(status.len(), 2);
        assert_eq!(status["1"]["queue"], "normal");
        assert_eq!(status["2"]["queue"], "express");
    }

    #[test]
    fn test_filter_by_project() {
        let output = "Job Id: 1.srv\n    project = ab12\n    Job_Owner = alice\n\
                      Job Id: 2.srv\n    project = xy99\n    Job_Owner = bob\n";

        let filter = StatusFilter {
            projects: vec!["xy99".to_string()],
            users: vec![],
        };
        let status = parse_status(output, "Job Id", &filter);
        assert_eq!(status.len(), 1);
        assert!(status.contains_key("2"));
    }

    #[test]
    fn test_filter_projects_or_users() {
        let output = "Job Id: 1.srv\n    project = ab12\n    Job_Owner = alice\n\
                      Job Id: 2.srv\n    project = xy99\n    Job_Owner = bob\n\
                      Job Id: 3.srv\n    project = qq00\n    Job_Owner = carol\n";

        let filter = StatusFilter {
            projects: vec!["xy99".to_string()],
            users: vec!["alice".to_string()],
        };
        let status = parse_status(output, "Job Id", &filter);
        assert_eq!(status.len(), 2);
        assert!(status.contains_key("1"));
        assert!(status.contains_key("2"));
    }

    #[test]
    fn test_parse_empty_output() {
        let status = parse_status("", "Job Id", &StatusFilter::default());
        assert!(status.is_empty());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("123.r-man2"), "123");
        assert_eq!(short_id("456"), "456");
    }

    #[test]
    fn test_query_flags() {
        assert_eq!(query_flags(None, false), ["-f"]);
        assert_eq!(query_flags(None, true), ["-ft"]);
        assert_eq!(query_flags(Some("123"), true), ["-ft", "123"]);
    }

    #[test]
    fn test_job_id_from_env() {
        // This test owns PBS_JOBID; set_var needs unsafe on edition 2024
        unsafe { std::env::set_var("PBS_JOBID", "123.r-man2") };
        assert_eq!(job_id_from_env(true).as_deref(), Some("123"));
        assert_eq!(job_id_from_env(false).as_deref(), Some("123.r-man2"));

        unsafe { std::env::remove_var("PBS_JOBID") };
        assert_eq!(job_id_from_env(true), None);
    }

    #[test]
    fn test_extract_job_info_adds_job_id() {
        let output = "Job Id: 123.r-man2\n    project = ab12\n    Job_Owner = alice\n";
        let status = parse_status(output, "Job Id", &StatusFilter::default());

        let attrs = extract_job_info(status, "123".to_string()).unwrap();
        assert_eq!(attrs["Job_ID"], "123");
        assert_eq!(attrs["project"], "ab12");
    }

    #[test]
    fn test_extract_job_info_missing_job() {
        let status = StatusMap::new();
        assert!(extract_job_info(status, "123".to_string()).is_none());
    }

    #[tokio::test]
    async fn test_fetch_unavailable_after_budget() {
        let conf = PbsConf::parse(Utf8Path::new("pbs.conf"), "PBS_EXEC=/nonexistent/pbs\n");
        let outcome = fetch_status_within(
            &conf,
            &[],
            "Job Id",
            &StatusFilter::default(),
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(outcome, StatusOutcome::Unavailable);
    }
}
