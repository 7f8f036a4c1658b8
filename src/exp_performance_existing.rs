//! Compare COVERED against existing cooperative caching methods on the Facebook photo workload
//! with the default 4-node prototype.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::RunMatrix;
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_performance_existing";

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

pub fn matrix(log_root: &Path, rounds: usize, caches: Vec<String>) -> RunMatrix {
    RunMatrix::new(SCRIPT, log_root, rounds, base()).caches(caches)
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_performance_existing =>
        (about: "Evaluate cache methods against each other. Must be run on the evaluator machine.")
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
    fn one_point_per_cache_and_round() {
        let caches = vec!["covered".to_owned(), "shark+gdsf".to_owned()];
        let points = matrix(Path::new("/logs"), 2, caches).points().unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!(
            points[3].log_path,
            PathBuf::from("/logs/exp_performance_existing/round1/tmp_evaluator_for_shark+gdsf.out")
        );
        assert_eq!(points[3].settings.cache_name.as_deref(), Some("shark+gdsf"));
        assert_eq!(points[3].settings.edgecnt, Some(4));
        assert_eq!(points[3].describe, "");
    }
}
