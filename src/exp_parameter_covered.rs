//! Sensitivity to the parameters of COVERED itself. Each parameter is swept on its own while the
//! others keep their defaults; the all-default point is the one of `exp_performance_existing`.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};

pub const SCRIPT: &str = "exp_parameter_covered";

/// Parameters that can be swept, as accepted by `--sweep`.
pub const SWEEPS: &[&str] = &["localmem", "globalmem", "popchange", "topk", "victimcnt"];

/// Swept when `--sweep` is not given.
pub const DEFAULT_SWEEPS: &[&str] = &["popchange", "topk"];

fn base() -> Settings {
    Settings {
        clientcnt: Some(4),
        edgecnt: Some(4),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        covered_local_uncached_max_mem_usage_mb: Some(1),
        covered_popularity_aggregation_max_mem_usage_mb: Some(1),
        covered_popularity_collection_change_ratio: Some(0.1),
        covered_topk_edgecnt: Some(1),
        covered_peredge_synced_victimcnt: Some(3),
        ..Settings::default()
    }
}

/// The points of one swept parameter, in order.
fn sweep(name: &str) -> Result<Vec<Variant>, failure::Error> {
    let variants = match name {
        "localmem" => [5u64, 10]
            .iter()
            .map(|&mb| {
                Variant::new(
                    format!("localmem{}", mb),
                    format!(" w/ {}MiB memory for local uncached popularity", mb),
                    Settings {
                        covered_local_uncached_max_mem_usage_mb: Some(mb),
                        ..Settings::default()
                    },
                )
            })
            .collect(),
        "globalmem" => [5u64, 10]
            .iter()
            .map(|&mb| {
                Variant::new(
                    format!("globalmem{}", mb),
                    format!(" w/ {}MiB memory for global uncached rewards", mb),
                    Settings {
                        covered_popularity_aggregation_max_mem_usage_mb: Some(mb),
                        ..Settings::default()
                    },
                )
            })
            .collect(),
        "popchange" => [0.2f64, 0.4, 0.8]
            .iter()
            .map(|&ratio| {
                Variant::new(
                    format!("popchange{:?}", ratio),
                    format!(" w/ {:?} threshold of popularity change ratio", ratio),
                    Settings {
                        covered_popularity_collection_change_ratio: Some(ratio),
                        ..Settings::default()
                    },
                )
            })
            .collect(),
        // Up to 4 as there are 4 edges.
        "topk" => [2u32, 3, 4]
            .iter()
            .map(|&k| {
                Variant::new(
                    format!("topk{}", k),
                    format!(" w/ top-{} popularity", k),
                    Settings {
                        covered_topk_edgecnt: Some(k),
                        ..Settings::default()
                    },
                )
            })
            .collect(),
        "victimcnt" => [10u32, 30]
            .iter()
            .map(|&cnt| {
                Variant::new(
                    format!("victimcnt{}", cnt),
                    format!(" w/ {} synced victims", cnt),
                    Settings {
                        covered_peredge_synced_victimcnt: Some(cnt),
                        ..Settings::default()
                    },
                )
            })
            .collect(),
        other => failure::bail!("unknown COVERED parameter {}", other),
    };

    Ok(variants)
}

/// Sweeps are run in the order of `SWEEPS`, whatever the order of `sweeps`.
pub fn matrix(
    log_root: &Path,
    rounds: usize,
    caches: Vec<String>,
    sweeps: &[&str],
) -> Result<RunMatrix, failure::Error> {
    if let Some(unknown) = sweeps.iter().find(|s| !SWEEPS.contains(s)) {
        failure::bail!("unknown COVERED parameter {}", unknown);
    }

    let mut variants = vec![];
    for name in SWEEPS.iter().filter(|s| sweeps.contains(s)) {
        variants.extend(sweep(name)?);
    }

    Ok(RunMatrix::new(SCRIPT, log_root, rounds, base())
        .caches(caches)
        .variants(variants))
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_parameter_covered =>
        (about: "Evaluate COVERED under different parameters. Must be run on the evaluator \
                 machine.")
        (@setting DisableVersion)
        (@arg SWEEP: --sweep +takes_value ... use_delimiter(true) possible_values(SWEEPS)
         "The parameters to sweep (default: popchange,topk)")
    };
    cli::matrix::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let (rounds, caches) = cli::matrix::parse_cli_options(sub_m, &["covered"]);
    let sweeps: Vec<&str> = match sub_m.values_of("SWEEP") {
        Some(values) => values.collect(),
        None => DEFAULT_SWEEPS.to_vec(),
    };
    let harness = Harness::from_matches(sub_m)?;

    let matrix = matrix(&harness.log_root()?, harness.rounds(rounds)?, caches, &sweeps)?;
    harness.run_prototype_matrix(&matrix)?;

    Ok(())
}
