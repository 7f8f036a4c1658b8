//! Sensitivity to the WAN latency, comparing the default bounds with a much larger setting.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_parameter_latency";

fn base() -> Settings {
    Settings {
        clientcnt: Some(12),
        edgecnt: Some(12),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        propagation_latency_clientedge_lbound_us: Some(500),
        propagation_latency_clientedge_avg_us: Some(1000),
        propagation_latency_clientedge_rbound_us: Some(1500),
        propagation_latency_crossedge_lbound_us: Some(1500),
        propagation_latency_crossedge_avg_us: Some(3000),
        propagation_latency_crossedge_rbound_us: Some(4500),
        propagation_latency_edgecloud_lbound_us: Some(6500),
        propagation_latency_edgecloud_avg_us: Some(13000),
        propagation_latency_edgecloud_rbound_us: Some(19500),
        ..Settings::default()
    }
}

/// 7.5 ms client-edge, 35 ms cross-edge, 150 ms edge-cloud on average.
fn large_wan() -> Variant {
    Variant::new(
        "large",
        " w/ large WAN delay setting",
        Settings {
            propagation_latency_clientedge_lbound_us: Some(5000),
            propagation_latency_clientedge_avg_us: Some(7500),
            propagation_latency_clientedge_rbound_us: Some(10000),
            propagation_latency_crossedge_lbound_us: Some(20000),
            propagation_latency_crossedge_avg_us: Some(35000),
            propagation_latency_crossedge_rbound_us: Some(50000),
            propagation_latency_edgecloud_lbound_us: Some(100_000),
            propagation_latency_edgecloud_avg_us: Some(150_000),
            propagation_latency_edgecloud_rbound_us: Some(200_000),
            ..Settings::default()
        },
    )
}

pub fn matrix(log_root: &Path, rounds: usize, caches: Vec<String>) -> RunMatrix {
    RunMatrix::new(SCRIPT, log_root, rounds, base())
        .caches(caches)
        .variants(vec![large_wan()])
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_parameter_latency =>
        (about: "Evaluate a large WAN delay setting. Must be run on the evaluator machine.")
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
    fn large_setting_replaces_every_bound() {
        let points = matrix(Path::new("/logs"), 2, vec!["shark+lhd".to_owned()])
            .points()
            .unwrap();
        assert_eq!(points.len(), 2);

        let s = &points[1].settings;
        assert_eq!(points[1].round, 1);
        assert_eq!(s.propagation_latency_clientedge_avg_us, Some(7500));
        assert_eq!(s.propagation_latency_crossedge_rbound_us, Some(50000));
        assert_eq!(s.propagation_latency_edgecloud_lbound_us, Some(100_000));
        assert_eq!(s.clientcnt, Some(12));
        assert!(points[1]
            .log_path
            .ends_with("exp_parameter_latency/round1/tmp_evaluator_for_shark+lhd_large.out"));
    }
}
