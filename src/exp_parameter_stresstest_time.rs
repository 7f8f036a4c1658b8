//! Whether cache stable performance holds over longer stresstests.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_parameter_stresstest_time";

/// 5 and 50 minutes.
pub const DURATIONS_SEC: &[u64] = &[300, 3000];

fn base() -> Settings {
    Settings {
        clientcnt: Some(12),
        edgecnt: Some(12),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        stresstest_duration_sec: Some(30),
        ..Settings::default()
    }
}

pub fn matrix(log_root: &Path, rounds: usize, caches: Vec<String>) -> RunMatrix {
    let variants = DURATIONS_SEC
        .iter()
        .map(|&secs| {
            Variant::new(
                secs,
                format!(" w/ stresstest time {} seconds", secs),
                Settings {
                    stresstest_duration_sec: Some(secs),
                    ..Settings::default()
                },
            )
        })
        .collect();

    RunMatrix::new(SCRIPT, log_root, rounds, base())
        .caches(caches)
        .variants(variants)
        .override_when(|ctx, settings| {
            if ctx.cache == "segcache+" && ctx.tag == Some("3000") {
                settings.warmup_reqcnt_scale = Some(4);
            }
        })
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_parameter_stresstest_time =>
        (about: "Evaluate stresstests of 5 and 50 minutes. Must be run on the evaluator machine.")
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
    fn durations() {
        let caches = vec!["segcache+".to_owned()];
        let points = matrix(Path::new("/logs"), 1, caches).points().unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].settings.stresstest_duration_sec, Some(300));
        assert_eq!(points[0].settings.warmup_reqcnt_scale, None);
        assert_eq!(points[1].settings.stresstest_duration_sec, Some(3000));
        assert_eq!(points[1].settings.warmup_reqcnt_scale, Some(4));
        assert!(points[1]
            .log_path
            .ends_with("exp_parameter_stresstest_time/round0/tmp_evaluator_for_segcache+_3000.out"));
    }
}
