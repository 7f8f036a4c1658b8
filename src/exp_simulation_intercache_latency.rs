//! Inter-cache (cross-edge) latency by single-node simulation at a large scale (128 edges, 10M
//! keys).
//!
//! By default, the simulator draws the latencies itself from uniform, Poisson and Pareto
//! distributions. With `--latency_matrix`, it instead reads the point-to-point latencies from
//! matrices generated by `gen_delay_matrix`, and the points go to `<script>_v2`.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_simulation_intercache_latency";
pub const MATRIX_SCRIPT: &str = "exp_simulation_intercache_latency_v2";

/// 1M keys are too few at this scale: every method gets a nearly full hit ratio.
pub const LARGESCALE_KEYCNT: u64 = 10_000_000;

/// (distribution name, lower bound, upper bound) of the cross-edge latency in µs.
pub const DISTRIBUTIONS: &[(&str, u64, u64)] = &[
    ("uniform", 2000, 4000),
    ("uniform", 2000, 8000),
    ("uniform", 2000, 12000),
    ("poisson_3000", 2000, 12000),
    ("poisson_6000", 2000, 12000),
    ("poisson_9000", 2000, 12000),
    ("pareto_1.0", 2000, 12000),
    ("pareto_1.5", 2000, 12000),
    ("pareto_2.0", 2000, 12000),
];

fn base() -> Settings {
    Settings {
        clientcnt: Some(128),
        edgecnt: Some(128),
        keycnt: Some(LARGESCALE_KEYCNT),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        simulator_randomness: Some(0),
        propagation_latency_distname: Some("uniform".into()),
        propagation_latency_crossedge_lbound_us: Some(1500),
        propagation_latency_crossedge_avg_us: Some(3000),
        propagation_latency_crossedge_rbound_us: Some(4500),
        ..Settings::default()
    }
}

fn distribution_variants() -> Vec<Variant> {
    DISTRIBUTIONS
        .iter()
        .map(|&(distname, lbound, rbound)| {
            // Only meaningful for uniform; the midpoint otherwise.
            let avg = (lbound + rbound) / 2;
            let tag = if distname == "uniform" {
                format!("uniform_{}", avg)
            } else {
                distname.to_owned()
            };

            Variant::new(
                tag,
                format!(" w/ {} inter-cache avg latency under {}", avg, distname),
                Settings {
                    propagation_latency_distname: Some(distname.to_owned()),
                    propagation_latency_crossedge_lbound_us: Some(lbound),
                    propagation_latency_crossedge_avg_us: Some(avg),
                    propagation_latency_crossedge_rbound_us: Some(rbound),
                    ..Settings::default()
                },
            )
        })
        .collect()
}

fn latency_matrix_variants(paths: &[String]) -> Vec<Variant> {
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            Variant::new(
                format!("avg{}", i),
                format!(" w/ latency matrix {}", path),
                Settings {
                    propagation_latency_distname: Some("constant".into()),
                    p2p_latency_mat_path: Some(path.clone()),
                    ..Settings::default()
                },
            )
        })
        .collect()
}

/// With no `latency_matrices`, sweep `DISTRIBUTIONS`.
pub fn matrix(
    log_root: &Path,
    rounds: usize,
    caches: Vec<String>,
    latency_matrices: &[String],
) -> RunMatrix {
    let (script, variants) = if latency_matrices.is_empty() {
        (SCRIPT, distribution_variants())
    } else {
        (MATRIX_SCRIPT, latency_matrix_variants(latency_matrices))
    };

    RunMatrix::new(script, log_root, rounds, base())
        .caches(caches)
        .variants(variants)
        .override_when(|ctx, settings| {
            settings.simulator_randomness = Some(ctx.round as u64);
        })
        .runner_label("single-node simulator")
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_simulation_intercache_latency =>
        (about: "Evaluate inter-cache latencies by single-node simulation.")
        (@setting DisableVersion)
        (@arg LATENCY_MATRIX: --latency_matrix +takes_value ... number_of_values(1)
         "Use this point-to-point latency matrix (from gen_delay_matrix) instead of the \
          built-in distributions. Can be given several times.")
    };
    cli::matrix::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let (rounds, caches) = cli::matrix::parse_cli_options(sub_m, DEFAULT_CACHE_NAMES);
    let harness = Harness::from_matches(sub_m)?;

    // The simulator runs in the project directory.
    let latency_matrices: Vec<String> = sub_m
        .values_of("LATENCY_MATRIX")
        .map(|values| {
            values
                .map(|p| harness.config.resolve(p).display().to_string())
                .collect()
        })
        .unwrap_or_default();

    let matrix = matrix(
        &harness.log_root()?,
        harness.rounds(rounds)?,
        caches,
        &latency_matrices,
    );
    harness.run_simulator_matrix(&matrix)?;

    Ok(())
}
