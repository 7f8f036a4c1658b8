//! Extract the characteristics (Zipf exponent, key and value size histograms) of the replayed
//! traces, for generating geo-distributed workloads with the same shape.
//!
//! Each workload's characteristics go to `<trace_dirpath>/<workload>.characteristics`; an existing
//! file is kept. The first client also copies the files to the cloud.

use std::path::{Path, PathBuf};

use clap::clap_app;

use crate::characteristics::Characteristics;
use crate::cli;
use crate::config::ConfigStore;
use crate::harness::Harness;
use crate::logger;
use crate::paths::ZIPF_WORKLOADS;
use crate::shell::Shell;
use crate::trace::TraceLoader;
use crate::zipf;

pub fn characteristics_path(trace_dir: &Path, workload: &str) -> PathBuf {
    trace_dir.join(format!("{}.characteristics", workload))
}

/// The trace files of `workload`, relative to `trace_dirpath`.
pub fn trace_files(config: &ConfigStore, workload: &str) -> Result<Vec<String>, failure::Error> {
    let short = workload.trim_start_matches("zipf_");
    config.get(&format!(
        "trace_dirpath_relative_{}_trace_filepaths",
        short
    ))
}

/// Load the traces of `workload` and compute their characteristics.
pub fn characterize(
    config: &ConfigStore,
    trace_dir: &Path,
    workload: &str,
) -> Result<Characteristics, failure::Error> {
    let files = trace_files(config, workload)?;
    let loader = TraceLoader::load(workload, trace_dir, &files)?;

    let freqs = loader.sorted_frequencies();
    logger::prompt(&format!(
        "curve fitting for workload {} ({} keys)...",
        workload,
        freqs.len()
    ));
    let zipf_exponent = zipf::fit_exponent(&freqs)?;
    logger::dump(&format!("zipf constant of {}: {}", workload, zipf_exponent));

    Ok(Characteristics {
        zipf_exponent,
        key_histogram: loader.key_size_histogram()?,
        value_histogram: loader.value_size_histogram(),
    })
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { characterize_traces =>
        (about: "Extract the characteristics of the replayed traces.")
        (@setting DisableVersion)
        (@arg WORKLOAD: --workload +takes_value ...
         possible_values(ZIPF_WORKLOADS)
         "Only characterize these workloads (default: all)")
    };
    cli::testbed::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let workloads: Vec<&str> = match sub_m.values_of("WORKLOAD") {
        Some(values) => values.collect(),
        None => ZIPF_WORKLOADS.to_vec(),
    };

    let harness = Harness::from_matches(sub_m)?;
    characterize_all(&harness, &workloads)
}

fn characterize_all<S: Shell>(harness: &Harness<S>, workloads: &[&str]) -> Result<(), failure::Error> {
    let testbed = &harness.testbed;
    let trace_dir = harness.config.get_path("trace_dirpath")?;
    let first_client = testbed.topology.clients.first() == Some(&testbed.current);

    for &workload in workloads {
        let path = characteristics_path(&trace_dir, workload);

        let generated = if path.exists() {
            logger::prompt(&format!(
                "characteristics file {} already exists, skip characterizing {}...",
                path.display(),
                workload
            ));
            false
        } else {
            let c = characterize(&harness.config, &trace_dir, workload)?;
            logger::prompt(&format!(
                "dump characteristics for workload {} into {}...",
                workload,
                path.display()
            ));
            c.save(&path)?;
            true
        };

        if first_client {
            if generated {
                logger::prompt(&format!(
                    "check if characteristics file {} is generated successfully in current \
                     machine...",
                    path.display()
                ));
                if !path.exists() {
                    failure::bail!("Characteristics file not found: {}", path.display());
                }
            }
            testbed.copy_to_cloud(&path)?;
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

    fn write_wikitext(dir: &Path) {
        let mut trace = String::from("relative_unix\thashed_host_path_query\tresponse_size\ttime\n");
        for rank in 1..=50u64 {
            let freq = 1000 / rank;
            for _ in 0..freq {
                trace.push_str(&format!("0\t{}\t{}\t0.1\n", rank, 2048 + rank));
            }
        }
        std::fs::write(dir.join("wiki.tsv"), trace).unwrap();
    }

    fn config(dir: &Path) -> ConfigStore {
        store_with(json!({
            "trace_dirpath": dir,
            "trace_dirpath_relative_wikitext_trace_filepaths": ["wiki.tsv"],
        }))
    }

    #[test]
    fn characterizes_and_copies() {
        let dir = tempfile::tempdir().unwrap();
        write_wikitext(dir.path());

        let shell = ScriptedShell::new(|call| {
            if call.command.starts_with("test -e") {
                ShellOutput::failed(1, "")
            } else {
                ShellOutput::ok("")
            }
        });
        let h = harness_with(shell, 2, config(dir.path()));
        characterize_all(&h, &["zipf_wikitext"]).unwrap();

        let path = characteristics_path(dir.path(), "zipf_wikitext");
        let c = Characteristics::load(&path).unwrap();
        assert!((c.zipf_exponent - 1.0).abs() < 0.1, "fitted {}", c.zipf_exponent);
        assert_eq!(c.key_histogram[7], 50);
        assert_eq!(c.value_histogram[2], 50);

        let calls = h.testbed.shell.calls.borrow();
        let copies: Vec<_> = calls
            .iter()
            .filter(|c| matches!(c.target, Target::Copy { .. }))
            .collect();
        assert_eq!(copies.len(), 1);
        assert!(copies[0].command.contains("zipf_wikitext.characteristics"));
    }

    #[test]
    fn existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = characteristics_path(dir.path(), "zipf_wikitext");
        let c = Characteristics {
            zipf_exponent: 0.5,
            key_histogram: vec![],
            value_histogram: vec![],
        };
        c.save(&path).unwrap();

        // Not the first client, so nothing is copied either.
        let h = harness_with(ScriptedShell::succeeding(), 1, config(dir.path()));
        characterize_all(&h, &["zipf_wikitext"]).unwrap();

        assert_eq!(Characteristics::load(&path).unwrap(), c);
        assert!(h.testbed.shell.calls.borrow().is_empty());
    }

    #[test]
    fn missing_file_list_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness_with(ScriptedShell::succeeding(), 1, config(dir.path()));
        assert!(characterize_all(&h, &["zipf_tencentphoto1"]).is_err());
    }
}
