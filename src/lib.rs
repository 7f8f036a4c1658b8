//! A library of routines for running COVERED experiments on a testbed of physical machines.
//!
//! The harness launches the cache-evaluation binaries (evaluator, cloud, edges, clients,
//! simulators, loaders) on the machines listed in `config.json`, watches their logs for the
//! well-known markers, and tears everything down afterwards. It also has a few offline tools for
//! characterizing traces, generating delay matrices, and scraping results.

// Must be imported first because the other submodules use the macros defined therein.
#[macro_use]
mod macros;

pub mod characteristics;
pub mod cli;
pub mod cliutil;
pub mod config;
pub mod delay;
pub mod harness;
pub mod launcher;
pub mod logger;
pub mod machine;
pub mod matrix;
pub mod pathprobe;
pub mod prototype;
pub mod role;
pub mod scrape;
pub mod shell;
pub mod testbed;
pub mod trace;
pub mod zipf;

// Routines (one per subcommand).
pub mod adhoc;
pub mod characterize_traces;
pub mod cleanup_testbed;
pub mod exp_alicloud_stresstest;
pub mod exp_alicloud_warmup;
pub mod exp_parameter_covered;
pub mod exp_parameter_datasetsize;
pub mod exp_parameter_latency;
pub mod exp_parameter_memory;
pub mod exp_parameter_stresstest_time;
pub mod exp_performance_existing;
pub mod exp_performance_skewness;
pub mod exp_performance_workloads;
pub mod exp_simulation_cachescale;
pub mod exp_simulation_intercache_latency;
pub mod load_dataset;
pub mod preprocess_traces;
pub mod walk_traces;

use std::path::PathBuf;

use failure_derive::Fail;

/// The kinds of failure the harness distinguishes. Everything else is reported as a plain
/// `failure::Error` with context.
#[derive(Debug, Fail)]
pub enum HarnessError {
    /// A required key is absent from `config.json`.
    #[fail(display = "key `{}` is missing in {}", key, file)]
    ConfigMissing { key: String, file: String },

    /// A routine was invoked on a machine that does not have the required role.
    #[fail(display = "{}", msg)]
    PreconditionMismatch { msg: String },

    /// Launching a binary (or a helper command) returned a nonzero exit code.
    #[fail(display = "failed to launch {} (errmsg: {})", what, errmsg)]
    SpawnFailure { what: String, errmsg: String },

    /// A marker was not found in a log file.
    #[fail(display = "{}", msg)]
    MarkerAbsent { msg: String },

    /// Some components could not be killed during cleanup.
    #[fail(display = "failed to kill {} on machine {} (errmsg: {})", binary, machine, errmsg)]
    CleanupResidual {
        machine: usize,
        binary: String,
        errmsg: String,
    },

    /// A line of an input trace does not have the expected shape.
    #[fail(display = "malformed line {} in {}: {}", line, file, reason)]
    TraceMalformed {
        file: String,
        line: usize,
        reason: String,
    },
}

/// Returns the login of the operator, preferring the login preserved by `sudo`.
pub fn invoking_username() -> Result<String, failure::Error> {
    for var in &["SUDO_USER", "USER"] {
        if let Ok(user) = std::env::var(var) {
            if !user.is_empty() {
                return Ok(user);
            }
        }
    }

    Err(failure::format_err!(
        "unable to determine the invoking user (neither SUDO_USER nor USER is set)"
    ))
}

/// Returns the path of the SSH key used to reach the other machines of the testbed. When run
/// under `sudo`, the key of the invoking user is used rather than root's.
pub fn ssh_key_path(username: &str) -> PathBuf {
    let home = match std::env::var("SUDO_USER") {
        Ok(ref sudo_user) if !sudo_user.is_empty() => PathBuf::from(dir!("/home", username)),
        _ => std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(dir!("/home", username))),
    };

    home.join(".ssh").join(paths::SSH_KEY_NAME)
}

/// Common paths and names.
pub mod paths {
    /// Name of the configuration file. The directory containing it is the project root, which is
    /// also where the evaluation binaries live on every machine.
    pub const CONFIG_FILENAME: &str = "config.json";

    /// Name of the private key (under `~/.ssh/`) used for all intra-testbed SSH and scp.
    pub const SSH_KEY_NAME: &str = "id_rsa_for_covered";

    /// Sourced before every remote command so that the evaluation binaries find their libraries.
    pub const REMOTE_BASHRC: &str = "$HOME/.bashrc_non_interactive";

    ///////////////////////////////////////////////////////////////////////////////
    // Workloads.

    /// Workloads whose dataset is generated rather than replayed.
    pub const NONREPLAYED_WORKLOADS: &[&str] = &["facebook"];

    /// Key counts loaded into the cloud for the non-replayed workloads.
    pub const NONREPLAYED_KEYCNTS: &[u64] = &[1_000_000, 2_000_000, 4_000_000];

    /// Workloads replayed from real traces (preprocessed on the clients first).
    pub const REPLAYED_WORKLOADS: &[&str] = &["wikitext", "wikiimage"];

    /// Workloads whose characteristics are extracted for the Zipf-based trace generator.
    pub const ZIPF_WORKLOADS: &[&str] = &[
        "zipf_wikitext",
        "zipf_wikiimage",
        "zipf_tencentphoto1",
        "zipf_tencentphoto2",
    ];

    /// Cache methods used by default, for a fast evaluation. More can be passed on the command
    /// line.
    pub const DEFAULT_CACHE_NAMES: &[&str] = &["covered", "shark+gdsf", "shark+lhd"];

    /// Name of the RocksDB directory the dataset loader creates for the cloud.
    pub const CLOUD_ROCKSDB_NAME: &str = "cloud0.db";
}
