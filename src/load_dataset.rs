//! Load every dataset used in the evaluation into the cloud's RocksDB: the generated workloads at
//! each key count, then the replayed traces (which must be preprocessed first).
//!
//! Must be run on the cloud machine. A dataset whose RocksDB directory already exists is skipped.

use std::path::PathBuf;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::config::ConfigStore;
use crate::harness::Harness;
use crate::launcher::{check_placement, RoleLauncher};
use crate::logger;
use crate::paths::*;
use crate::role::Role;
use crate::shell::Shell;

/// One dataset to load.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadJob {
    pub workload: String,
    pub keycnt: u64,
    /// Created by the loader; its presence means the job is done.
    pub rocksdb_path: PathBuf,
    pub log_path: PathBuf,
}

/// All datasets, in loading order.
pub fn plan(config: &ConfigStore) -> Result<Vec<LoadJob>, failure::Error> {
    let log_root = config.get_path("output_log_dirpath")?;
    let rocksdb_root = config.get_path("cloud_rocksdb_basedir")?;

    let job = |workload: &str, keycnt: u64| LoadJob {
        workload: workload.to_owned(),
        keycnt,
        rocksdb_path: rocksdb_root
            .join(format!("key{}_{}", keycnt, workload))
            .join(CLOUD_ROCKSDB_NAME),
        log_path: log_root.join(format!(
            "tmp_dataset_loader_for_{}_key{}.out",
            workload, keycnt
        )),
    };

    let mut jobs = vec![];
    for &workload in NONREPLAYED_WORKLOADS {
        for &keycnt in NONREPLAYED_KEYCNTS {
            jobs.push(job(workload, keycnt));
        }
    }

    // Key counts of replayed traces are written to the config by trace preprocessing.
    for &workload in REPLAYED_WORKLOADS {
        let keycnt: i64 = config.get(&format!("trace_{}_keycnt", workload))?;
        if keycnt <= 0 {
            failure::bail!(
                "Invalid keycnt {} for replayed trace {}, please preprocess the trace before \
                 loading!",
                keycnt,
                workload
            );
        }
        jobs.push(job(workload, keycnt as u64));
    }

    Ok(jobs)
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { load_dataset =>
        (about: "Load all datasets into the cloud's RocksDB. Must be run on the cloud machine.")
        (@setting DisableVersion)
    };
    cli::testbed::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let harness = Harness::from_matches(sub_m)?;
    load_all(&harness)
}

fn load_all<S: Shell>(harness: &Harness<S>) -> Result<(), failure::Error> {
    let testbed = &harness.testbed;
    check_placement(Role::DatasetLoader, &testbed.topology, testbed.current)?;

    for job in plan(&harness.config)? {
        if job.rocksdb_path.exists() {
            logger::prompt(&format!(
                "Rocksdb dirpath {} already exists, skip dataset loading for {} with keycnt {}...",
                job.rocksdb_path.display(),
                job.workload,
                job.keycnt
            ));
            continue;
        }

        if let Some(dir) = job.log_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let settings = Settings {
            keycnt: Some(job.keycnt),
            workload_name: Some(job.workload.clone()),
            ..Settings::default()
        };
        RoleLauncher::new(testbed, Role::DatasetLoader, settings)
            .logfile(&job.log_path.display().to_string())
            .timing(harness.timing)
            .run()?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    use serde_json::json;

    use crate::cliutil::test::CLIUTIL_OUTPUT;
    use crate::config::test::store_with;
    use crate::harness::test::harness_with;
    use crate::role::DATASET_LOADER_DONE;
    use crate::shell::testing::ScriptedShell;
    use crate::shell::ShellOutput;

    fn config(root: &std::path::Path, wikitext_keycnt: i64) -> ConfigStore {
        store_with(json!({
            "output_log_dirpath": root.join("output"),
            "cloud_rocksdb_basedir": root.join("db"),
            "trace_wikitext_keycnt": wikitext_keycnt,
            "trace_wikiimage_keycnt": 1234,
        }))
    }

    #[test]
    fn plan_covers_generated_then_replayed() {
        let jobs = plan(&config(std::path::Path::new("/data"), 5678)).unwrap();
        let names: Vec<(&str, u64)> = jobs.iter().map(|j| (j.workload.as_str(), j.keycnt)).collect();
        assert_eq!(
            names,
            vec![
                ("facebook", 1_000_000),
                ("facebook", 2_000_000),
                ("facebook", 4_000_000),
                ("wikitext", 5678),
                ("wikiimage", 1234),
            ]
        );
        assert_eq!(
            jobs[3].rocksdb_path,
            PathBuf::from("/data/db/key5678_wikitext/cloud0.db")
        );
        assert_eq!(
            jobs[0].log_path,
            PathBuf::from("/data/output/tmp_dataset_loader_for_facebook_key1000000.out")
        );
    }

    #[test]
    fn unpreprocessed_trace_is_fatal() {
        assert!(plan(&config(std::path::Path::new("/data"), 0)).is_err());
    }

    #[test]
    fn existing_databases_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 5678);
        for job in plan(&config).unwrap() {
            if job.workload != "wikiimage" {
                std::fs::create_dir_all(&job.rocksdb_path).unwrap();
            }
        }

        let shell = ScriptedShell::new(|call| {
            if call.command.contains("./cliutil") {
                ShellOutput::ok(CLIUTIL_OUTPUT)
            } else if call.command.contains("grep -F") && !call.command.contains("ps -aux") {
                ShellOutput::ok(DATASET_LOADER_DONE)
            } else {
                ShellOutput::ok("")
            }
        });
        let h = harness_with(shell, 0, config);
        load_all(&h).unwrap();

        let launches = h.testbed.shell.matching("nohup ./dataset_loader");
        assert_eq!(launches.len(), 1);
        assert!(launches[0]
            .command
            .contains("tmp_dataset_loader_for_wikiimage_key1234.out"));
        assert!(h
            .testbed
            .shell
            .matching("./cliutil")
            .iter()
            .all(|c| c.command.contains("--workload_name 'wikiimage'")));
    }

    #[test]
    fn only_on_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness_with(ScriptedShell::succeeding(), 2, config(dir.path(), 5678));
        assert!(load_all(&h).is_err());
        assert!(h.testbed.shell.calls.borrow().is_empty());
    }
}
