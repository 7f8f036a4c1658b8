//! Warmup on Alibaba Cloud for each origin of the cloud, dumping the real network delays
//! (`realnet_option` "dump") for `exp_alicloud_stresstest`.

use std::path::Path;

use clap::clap_app;

use crate::cli;
use crate::cliutil::Settings;
use crate::config::ConfigStore;
use crate::exp_alicloud_stresstest::realnet_expname;
use crate::harness::Harness;
use crate::matrix::{RunMatrix, Variant};
use crate::paths::DEFAULT_CACHE_NAMES;

pub const SCRIPT: &str = "exp_alicloud_warmup";

pub const ORIGINS: &[&str] = &["shanghai", "singapore", "silicon"];

fn base() -> Settings {
    // The average latencies only shape the warmup; the stresstest uses the real ones.
    Settings {
        clientcnt: Some(16),
        edgecnt: Some(16),
        keycnt: Some(1_000_000),
        capacity_mb: Some(1024),
        workload_name: Some("facebook".into()),
        propagation_latency_distname: Some("constant".into()),
        propagation_latency_clientedge_avg_us: Some(1000),
        propagation_latency_crossedge_avg_us: Some(10000),
        propagation_latency_edgecloud_avg_us: Some(100_000),
        realnet_option: Some("dump".into()),
        ..Settings::default()
    }
}

/// Measured average latencies, one per round.
fn latency_list(
    config: &ConfigStore,
    key: &str,
    rounds: usize,
) -> Result<Vec<u64>, failure::Error> {
    let list: Vec<u64> = config.get(key)?;
    if list.len() < rounds {
        failure::bail!(
            "{} has {} latencies, but {} rounds are requested",
            key,
            list.len(),
            rounds
        );
    }
    Ok(list)
}

pub fn matrix(
    config: &ConfigStore,
    log_root: &Path,
    rounds: usize,
    caches: Vec<String>,
) -> Result<RunMatrix, failure::Error> {
    let clientedge = latency_list(config, "alicloud_avg_clientedge_latency_us_list", rounds)?;
    let crossedge = latency_list(config, "alicloud_avg_crossedge_latency_us_list", rounds)?;
    let mut edgecloud = Vec::with_capacity(ORIGINS.len());
    for origin in ORIGINS {
        let key = format!("{}_alicloud_avg_edgecloud_latency_us_list", origin);
        edgecloud.push((*origin, latency_list(config, &key, rounds)?));
    }

    let variants = ORIGINS
        .iter()
        .map(|&origin| Variant::new(origin, format!(" w/ origin {}", origin), Settings::default()))
        .collect();

    Ok(RunMatrix::new(SCRIPT, log_root, rounds, base())
        .caches(caches)
        .variants(variants)
        .override_when(move |ctx, settings| {
            let origin = match ctx.tag {
                Some(origin) => origin,
                None => return,
            };
            settings.realnet_expname = Some(realnet_expname(ctx.round, ctx.cache, origin));
            settings.propagation_latency_clientedge_avg_us = clientedge.get(ctx.round).copied();
            settings.propagation_latency_crossedge_avg_us = crossedge.get(ctx.round).copied();
            settings.propagation_latency_edgecloud_avg_us = edgecloud
                .iter()
                .find(|(o, _)| *o == origin)
                .and_then(|(_, list)| list.get(ctx.round).copied());
        })
        .summary_word("warmup"))
}

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { exp_alicloud_warmup =>
        (about: "Warm up on Alibaba Cloud and dump the real network delays. Must be run on the \
                 evaluator machine.")
        (@setting DisableVersion)
    };
    cli::matrix::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let (rounds, caches) = cli::matrix::parse_cli_options(sub_m, DEFAULT_CACHE_NAMES);
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

#[cfg(test)]
mod test {
    use super::*;

    use serde_json::json;

    use crate::config::test::store_with;

    fn config() -> ConfigStore {
        store_with(json!({
            "alicloud_avg_clientedge_latency_us_list": [500, 600],
            "alicloud_avg_crossedge_latency_us_list": [7000, 8000],
            "shanghai_alicloud_avg_edgecloud_latency_us_list": [30000, 31000],
            "singapore_alicloud_avg_edgecloud_latency_us_list": [60000, 61000],
            "silicon_alicloud_avg_edgecloud_latency_us_list": [150000, 151000],
        }))
    }

    #[test]
    fn per_round_latencies() {
        let caches = vec!["covered".to_owned()];
        let points = matrix(&config(), Path::new("/logs"), 2, caches)
            .unwrap()
            .points()
            .unwrap();
        assert_eq!(points.len(), 6);

        let singapore = &points[4];
        assert_eq!(singapore.round, 1);
        assert_eq!(singapore.tag.as_deref(), Some("singapore"));
        assert_eq!(singapore.settings.propagation_latency_clientedge_avg_us, Some(600));
        assert_eq!(singapore.settings.propagation_latency_crossedge_avg_us, Some(8000));
        assert_eq!(singapore.settings.propagation_latency_edgecloud_avg_us, Some(61000));
        assert_eq!(
            singapore.settings.realnet_expname.as_deref(),
            Some("exp_alicloud_round1_covered_singapore")
        );
        assert_eq!(singapore.settings.realnet_option.as_deref(), Some("dump"));
    }

    #[test]
    fn too_few_latencies_for_the_rounds() {
        assert!(matrix(&config(), Path::new("/logs"), 3, vec!["covered".to_owned()]).is_err());
    }
}
