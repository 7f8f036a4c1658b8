//! Performance under Zipf workloads of different skewness over the Facebook dataset.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_performance_skewness";

pub const ZIPF_ALPHAS: &[f64] = &[0.2, 0.4, 0.6, 0.8, 1.0];

fn base() -> Settings {
    Settings {
        clientcnt: Some(4),
        edgecnt: Some(4),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("zipf_facebook".into()),
        zipf_alpha: Some(0.0),
        ..Settings::default()
    }
}

pub fn matrix(log_root: &Path, rounds: usize, caches: Vec<String>) -> RunMatrix {
    let variants = ZIPF_ALPHAS
        .iter()
        .map(|&alpha| {
            Variant::new(
                format!("{:?}", alpha),
                format!(" w/ alpha {:?}", alpha),
                Settings {
                    zipf_alpha: Some(alpha),
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
    let app = clap_app! { exp_performance_skewness =>
        (about: "Evaluate Zipf workloads with alpha from 0.2 to 1.0. Must be run on the \
                 evaluator machine.")
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
