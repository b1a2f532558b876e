//! PBS integration for quoll.
//!
//! Builds qsub submission commands and parses qstat output. Only the PBS
//! command-line tools are touched; the native server protocol is not.

pub mod mounts;
pub mod qstat;
pub mod qsub;
pub mod types;

pub use qstat::{
    StatusFilter, StatusMap, StatusOutcome, fetch_job_info, fetch_status, fetch_status_within,
    parse_status, query_flags,
};
pub use qsub::{SubmitError, build_submit_command};
pub use types::{JobRequest, SubmitContext};
