//! Sensitivity to the per-edge memory capacity. 1 GiB is left out as it is the default of the
//! other experiments.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_parameter_memory";

pub const CAPACITIES_MB: &[u64] = &[2048, 4096, 8192];

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
    let variants = CAPACITIES_MB
        .iter()
        .map(|&capacity_mb| {
            Variant::new(
                capacity_mb,
                format!(" w/ per-edge memory capacity {} MiB", capacity_mb),
                Settings {
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
            // SegCache runs out of memory when warming up 8 GiB with 10M requests.
            if ctx.cache == "segcache+" && ctx.tag == Some("8192") {
                settings.warmup_reqcnt_scale = Some(4);
            }
        })
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_parameter_memory =>
        (about: "Evaluate per-edge memory capacities of 2, 4 and 8 GiB. Must be run on the \
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

#[cfg(test)]
mod test {
    use super::*;

    use std::path::PathBuf;

    #[test]
    fn capacities_per_cache() {
        let caches = vec!["covered".to_owned(), "segcache+".to_owned()];
        let points = matrix(Path::new("/logs"), 1, caches).points().unwrap();

        assert_eq!(points.len(), 6);
        assert_eq!(
            points[0].log_path,
            PathBuf::from("/logs/exp_parameter_memory/round0/tmp_evaluator_for_covered_2048.out")
        );
        assert_eq!(points[0].settings.capacity_mb, Some(2048));
        assert_eq!(points[0].describe, " w/ per-edge memory capacity 2048 MiB");
    }

    #[test]
    fn segcache_warms_up_less_at_8_gib() {
        let caches = vec!["covered".to_owned(), "segcache+".to_owned()];
        let points = matrix(Path::new("/logs"), 1, caches).points().unwrap();

        let scale = |cache: &str, tag: &str| {
            points
                .iter()
                .find(|p| p.cache == cache && p.tag.as_deref() == Some(tag))
                .unwrap()
                .settings
                .warmup_reqcnt_scale
        };
        assert_eq!(scale("segcache+", "8192"), Some(4));
        assert_eq!(scale("segcache+", "4096"), None);
        assert_eq!(scale("covered", "8192"), None);
    }
}
