//! Job request types.

use camino::{Utf8Path, Utf8PathBuf};
use quoll_core::PbsConf;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Scheduler options for one qsub invocation.
///
/// Every field is optional; the command builder fills in defaults where PBS
/// expects a value (queue, project, jobname, join mode).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobRequest {
    /// Submission queue
    pub queue: Option<String>,

    /// Accounting project
    pub project: Option<String>,

    /// Walltime limit (e.g. "2:00:00")
    pub walltime: Option<String>,

    /// CPU count
    pub ncpus: Option<u32>,

    /// Memory request (e.g. "8GB")
    pub mem: Option<String>,

    /// Per-job scratch space (e.g. "100GB")
    pub jobfs: Option<String>,

    /// Job name (PBSPro truncates at 15 characters)
    pub jobname: Option<String>,

    /// Scheduling priority
    pub priority: Option<i32>,

    /// Stream join mode: "oe", "eo", or "n"
    pub join: Option<String>,

    /// Mount point -> project codes the job needs storage access to
    #[serde(default)]
    pub storage: BTreeMap<String, Vec<String>>,

    /// Raw flags appended verbatim
    pub qsub_flags: Option<String>,
}

/// Ambient inputs to command building, captured explicitly rather than read
/// from process globals inside the builder.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    /// Interpreter that will execute the job script.
    pub interpreter: Utf8PathBuf,

    /// Directory searched for relative script paths when QUOLL_PATH is
    /// unset in the job's environment variables.
    pub bin_dir: Utf8PathBuf,

    /// Default project when the request does not name one.
    pub project: Option<String>,
}

impl SubmitContext {
    /// Capture the current process context: the running executable as the
    /// job interpreter, the argv[0] directory for relative script lookup,
    /// and the site PROJECT as the default project.
    pub fn from_env(conf: &PbsConf) -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        let interpreter = Utf8PathBuf::from_path_buf(exe).map_err(|path| {
            std::io::Error::other(format!("non-UTF-8 executable path: {}", path.display()))
        })?;
        let bin_dir = std::env::args()
            .next()
            .map(Utf8PathBuf::from)
            .and_then(|argv0| argv0.parent().map(Utf8Path::to_path_buf))
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        Ok(Self {
            interpreter,
            bin_dir,
            project: conf.lookup("PROJECT"),
        })
    }
}
