//! CLI argument parsing for quoll.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "quoll")]
#[command(about = "Submit and query PBS jobs")]
pub struct Args {
    /// Path to pbs.conf (defaults to PBS_CONF_FILE or the platform location)
    #[arg(long)]
    pub pbs_conf: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and run a qsub submission for a job script
    Submit {
        /// Job script to submit
        script: Utf8PathBuf,

        /// Job request file (JSON)
        #[arg(long)]
        config: Option<Utf8PathBuf>,

        /// Environment variable to pass to the job (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Print the qsub command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Query job status via qstat
    Status {
        /// Job ID to query (all jobs when omitted)
        job_id: Option<String>,

        /// Keep only jobs under these projects
        #[arg(long = "project")]
        projects: Vec<String>,

        /// Keep only jobs owned by these users
        #[arg(long = "user")]
        users: Vec<String>,

        /// Include array subjobs in the query
        #[arg(long)]
        full: bool,
    },
}
