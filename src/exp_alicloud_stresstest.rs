//! Stresstest on Alibaba Cloud, replaying the real network delays dumped by `exp_alicloud_warmup`
//! (`realnet_option` "load").

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::config::ConfigStore;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};

pub const SCRIPT: &str = "exp_alicloud_stresstest";

pub const DEFAULT_CACHES: &[&str] = &["covered", "gdsf+", "lhd+"];

pub const CAPACITIES_MB: &[u64] = &[1024, 2048, 4096, 8192];

/// Per-edge capacity (MiB) of each workload: half of the dataset over 4 edges.
pub const WORKLOAD_CAPACITIES_MB: &[(&str, u64)] =
    &[("facebook", 3479), ("wikitext", 1778), ("wikiimage", 3899)];

fn base(config: &ConfigStore) -> Result<Settings, failure::Error> {
    Ok(Settings {
        clientcnt: Some(4),
        edgecnt: Some(4),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        propagation_latency_clientedge_us: Some(config.get("alicloud_avg_clientedge_latency_us")?),
        propagation_latency_crossedge_us: Some(config.get("alicloud_avg_crossedge_latency_us")?),
        propagation_latency_edgecloud_us: Some(config.get("alicloud_avg_edgecloud_latency_us")?),
        realnet_option: Some("load".into()),
        ..Settings::default()
    })
}

/// The real-network experiment a point belongs to. Must match the name used when the delays
/// were dumped.
pub fn realnet_expname(round: usize, cache: &str, tag: &str) -> String {
    format!("exp_alicloud_round{}_{}_{}", round, cache, tag)
}

pub fn matrix(
    config: &ConfigStore,
    log_root: &Path,
    rounds: usize,
    caches: Vec<String>,
) -> Result<RunMatrix, failure::Error> {
    let capacities = CAPACITIES_MB.iter().map(|&capacity_mb| {
        Variant::new(
            capacity_mb,
            format!(" w/ per-edge memory capacity {} MiB", capacity_mb),
            Settings {
                capacity_mb: Some(capacity_mb),
                ..Settings::default()
            },
        )
    });
    let workloads = WORKLOAD_CAPACITIES_MB
        .iter()
        .map(|&(workload, capacity_mb)| {
            Variant::new(
                workload,
                format!(" w/ {}", workload),
                Settings {
                    capacity_mb: Some(capacity_mb),
                    workload_name: Some(workload.to_owned()),
                    ..Settings::default()
                },
            )
        });

    Ok(RunMatrix::new(SCRIPT, log_root, rounds, base(config)?)
        .caches(caches)
        .variants(capacities.chain(workloads).collect())
        .override_when(|ctx, settings| {
            if let Some(tag) = ctx.tag {
                settings.realnet_expname = Some(realnet_expname(ctx.round, ctx.cache, tag));
            }
            if ctx.cache == "segcache+" && ctx.tag == Some("8192") {
                settings.warmup_reqcnt_scale = Some(4);
            }
        })
        .summary_word("stresstest"))
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_alicloud_stresstest =>
        (about: "Stresstest on Alibaba Cloud with real network delays. Must be run on the \
                 evaluator machine.")
        (@setting DisableVersion)
    };
    cli::matrix::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let (rounds, caches) = cli::matrix::parse_cli_options(sub_m, DEFAULT_CACHES);
    let harness = Harness::from_matches(sub_m)?;

    let matrix = matrix(
        &harness.config,
        &harness.log_root()?,
        harness.rounds(rounds)?,
        caches,
    )?;
    harness.run_prototype_matrix(&matrix)?;

    Ok(())
}
