//! Preprocess the replayed traces on a client machine, dumping the sampled dataset and workload
//! files next to the traces. The first client also ships each dataset file to the cloud, which
//! loads it with `load_dataset`.

use std::path::PathBuf;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::launcher::{check_placement, RoleLauncher};
use crate::logger;
use crate::paths::REPLAYED_WORKLOADS;
use crate::role::Role;
use crate::shell::Shell;

/// The files the trace preprocessor writes for `workload`.
pub fn output_paths(trace_dir: &std::path::Path, workload: &str, opcnt: u64) -> (PathBuf, PathBuf) {
    (
        trace_dir.join(format!("{}.dataset.{}", workload, opcnt)),
        trace_dir.join(format!("{}.workload.{}", workload, opcnt)),
    )
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { preprocess_traces =>
        (about: "Preprocess the replayed traces. Must be run on a client machine.")
        (@setting DisableVersion)
    };
    cli::testbed::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let harness = Harness::from_matches(sub_m)?;
    preprocess_all(&harness)
}

fn preprocess_all<S: Shell>(harness: &Harness<S>) -> Result<(), failure::Error> {
    let testbed = &harness.testbed;
    check_placement(Role::TracePreprocessor, &testbed.topology, testbed.current)?;

    let log_root = harness.log_root()?;
    let trace_dir = harness.config.get_path("trace_dirpath")?;
    let opcnt: u64 = harness.config.get("trace_sample_opcnt")?;
    let first_client = testbed.topology.clients.first() == Some(&testbed.current);

    std::fs::create_dir_all(&log_root)?;

    for &workload in REPLAYED_WORKLOADS {
        let (dataset, workload_file) = output_paths(&trace_dir, workload, opcnt);

        let generated = if dataset.exists() && workload_file.exists() {
            logger::prompt(&format!(
                "Dataset file {} and workload file {} already exist, skip trace preprocessing...",
                dataset.display(),
                workload_file.display()
            ));
            false
        } else {
            logger::prompt(&format!(
                "preprocess workload {} in current machine...",
                workload
            ));

            let log_path = log_root.join(format!("tmp_trace_preprocessor_for_{}.out", workload));
            let settings = Settings {
                workload_name: Some(workload.to_owned()),
                ..Settings::default()
            };
            RoleLauncher::new(testbed, Role::TracePreprocessor, settings)
                .logfile(&log_path.display().to_string())
                .timing(harness.timing)
                .run()?;
            true
        };

        // Only the first client copies, so the cloud gets one copy.
        if first_client {
            if generated {
                logger::prompt(&format!(
                    "check if dataset file {} is generated successfully in current machine...",
                    dataset.display()
                ));
                if !dataset.exists() {
                    failure::bail!("Dataset file not found: {}", dataset.display());
                }
            }
            testbed.copy_to_cloud(&dataset)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    use serde_json::json;

    use crate::config::test::store_with;
    use crate::harness::test::harness_with;
    use crate::shell::testing::{ScriptedShell, Target};
    use crate::shell::ShellOutput;

    #[test]
    fn existing_outputs_are_only_copied() {
        let dir = tempfile::tempdir().unwrap();
        for workload in REPLAYED_WORKLOADS {
            let (dataset, workload_file) = output_paths(dir.path(), workload, 100);
            std::fs::write(dataset, "").unwrap();
            std::fs::write(workload_file, "").unwrap();
        }

        let config = store_with(json!({
            "output_log_dirpath": dir.path().join("output"),
            "trace_dirpath": dir.path(),
            "trace_sample_opcnt": 100,
        }));
        let shell = ScriptedShell::new(|call| {
            if call.command.starts_with("test -e") {
                ShellOutput::failed(1, "")
            } else {
                ShellOutput::ok("")
            }
        });
        let h = harness_with(shell, 2, config);
        preprocess_all(&h).unwrap();

        let calls = h.testbed.shell.calls.borrow();
        assert!(calls.iter().all(|c| !c.command.contains("nohup")));

        let copies: Vec<_> = calls
            .iter()
            .filter(|c| matches!(c.target, Target::Copy { .. }))
            .collect();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].ip(), Some("10.0.0.1"));
        assert!(copies[0].command.contains("wikitext.dataset.100"));
        assert!(copies[1].command.contains("wikiimage.dataset.100"));
    }

    #[test]
    fn only_on_clients() {
        let h = harness_with(
            ScriptedShell::succeeding(),
            1,
            store_with(json!({ "trace_sample_opcnt": 100 })),
        );
        assert!(preprocess_all(&h).is_err());
        assert!(h.testbed.shell.calls.borrow().is_empty());
    }
}
