//! Cache scale (number of edges) by single-node simulation. Needs no testbed role, as nothing is
//! launched on the other machines.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};

pub const SCRIPT: &str = "exp_simulation_cachescale";

pub const DEFAULT_CACHES: &[&str] = &[
    "covered",
    "shark+gdsf",
    "shark+lhd",
    "shark",
    "gdsf",
    "lhd",
    "magnet",
    "bestguess",
];

pub const DEFAULT_EDGECNTS: &[u32] = &[12];

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

/// One client per edge at every scale.
pub fn matrix(log_root: &Path, rounds: usize, caches: Vec<String>, edgecnts: &[u32]) -> RunMatrix {
    let variants = edgecnts
        .iter()
        .map(|&edgecnt| {
            Variant::new(
                edgecnt,
                format!(" w/ {} edgecnt", edgecnt),
                Settings {
                    clientcnt: Some(edgecnt),
                    edgecnt: Some(edgecnt),
                    ..Settings::default()
                },
            )
        })
        .collect();

    RunMatrix::new(SCRIPT, log_root, rounds, base())
        .caches(caches)
        .variants(variants)
        .runner_label("single-node simulator")
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_simulation_cachescale =>
        (about: "Evaluate different numbers of edges by single-node simulation.")
        (@setting DisableVersion)
        (@arg EDGECNT: --edgecnt +takes_value ... use_delimiter(true) {crate::cli::is::<u32>}
         "The numbers of edges to simulate (default: 12)")
    };
    cli::matrix::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let (rounds, caches) = cli::matrix::parse_cli_options(sub_m, DEFAULT_CACHES);
    let edgecnts: Vec<u32> = match sub_m.values_of("EDGECNT") {
        Some(values) => values.map(|s| s.parse::<u32>().unwrap()).collect(),
        None => DEFAULT_EDGECNTS.to_vec(),
    };
    let harness = Harness::from_matches(sub_m)?;

    let matrix = matrix(&harness.log_root()?, harness.rounds(rounds)?, caches, &edgecnts);
    harness.run_simulator_matrix(&matrix)?;

    Ok(())
}
