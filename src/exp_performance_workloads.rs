//! Performance under Zipf workloads shaped like the real traces (see `characterize_traces`).

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_performance_workloads";

pub const WORKLOADS: &[&str] = &[
    "zipf_wikiimage",
    "zipf_wikitext",
    "zipf_tencentphoto1",
    "zipf_tencentphoto2",
];

fn base() -> Settings {
    Settings {
        clientcnt: Some(12),
        edgecnt: Some(12),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        ..Settings::default()
    }
}

pub fn matrix(log_root: &Path, rounds: usize, caches: Vec<String>) -> RunMatrix {
    let variants = WORKLOADS
        .iter()
        .map(|&workload| {
            Variant::new(
                workload,
                format!(" w/ workload {}", workload),
                Settings {
                    workload_name: Some(workload.to_owned()),
                    ..Settings::default()
                },
            )
        })
        .collect();

    RunMatrix::new(SCRIPT, log_root, rounds, base())
        .caches(caches)
        .variants(variants)
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_performance_workloads =>
        (about: "Evaluate the trace-shaped Zipf workloads. Must be run on the evaluator machine.")
        (@setting DisableVersion)
    };
    cli::matrix::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let (rounds, caches) = cli::matrix::parse_cli_options(sub_m, DEFAULT_CACHE_NAMES);
    let harness = Harness::from_matches(sub_m)?;

    let matrix = matrix(&harness.log_root()?, harness.rounds(rounds)?, caches);
    harness.run_prototype_matrix(&matrix)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_point_per_workload() {
        let caches = vec!["covered".to_owned(), "shark+lhd".to_owned()];
        let points = matrix(Path::new("/logs"), 3, caches).points().unwrap();
        assert_eq!(points.len(), 3 * 2 * 4);

        let p = &points[5];
        assert_eq!(p.round, 0);
        assert_eq!(p.cache, "shark+lhd");
        assert_eq!(p.settings.workload_name.as_deref(), Some("zipf_wikitext"));
        assert!(p
            .log_path
            .ends_with("round0/tmp_evaluator_for_shark+lhd_zipf_wikitext.out"));
    }
}
