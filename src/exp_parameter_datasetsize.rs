//! Sensitivity to the dataset size, with the per-edge capacity fixed at 1 GiB.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_parameter_datasetsize";

/// (keycnt, per-edge capacity in MiB)
pub const DATASET_SIZES: &[(u64, u64)] = &[(2_000_000, 1024), (4_000_000, 1024)];

fn base() -> Settings {
    Settings {
        clientcnt: Some(4),
        edgecnt: Some(4),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        ..Settings::default()
    }
}

/// Fewer warmup requests for the baselines that cannot hold the larger datasets in memory for
/// long.
fn warmup_scale(cache: &str, keycnt: u64) -> Option<u32> {
    match (cache, keycnt) {
        ("lrb+", 4_000_000) => Some(2),
        ("lrb+", 2_000_000) => Some(5),
        ("segcache+", 2_000_000) => Some(3),
        ("segcache+", 4_000_000) => Some(2),
        _ => None,
    }
}

pub fn matrix(log_root: &Path, rounds: usize, caches: Vec<String>) -> RunMatrix {
    let variants = DATASET_SIZES
        .iter()
        .map(|&(keycnt, capacity_mb)| {
            Variant::new(
                format!("{}_{}", keycnt, capacity_mb),
                format!(" w/ {} dataset size ({} GiB cache space)", keycnt, capacity_mb),
                Settings {
                    keycnt: Some(keycnt),
                    capacity_mb: Some(capacity_mb),
                    ..Settings::default()
                },
            )
        })
        .collect();

    RunMatrix::new(SCRIPT, log_root, rounds, base())
        .caches(caches)
        .variants(variants)
        .override_when(|ctx, settings| {
            if let Some(scale) = settings
                .keycnt
                .and_then(|keycnt| warmup_scale(ctx.cache, keycnt))
            {
                settings.warmup_reqcnt_scale = Some(scale);
            }
        })
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_parameter_datasetsize =>
        (about: "Evaluate datasets of 2M and 4M keys. Must be run on the evaluator machine.")
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
