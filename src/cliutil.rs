//! Composing the command lines of the evaluation binaries.
//!
//! We do not know how each binary wants its parameters; `./cliutil` in the project directory does.
//! We hand it every setting as `--key value` and it prints one line per role, e.g.
//! `Edge: --cache_name covered --capacity_mb 1024`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::role::Role;
use crate::shell::{quote, Shell};
use crate::testbed::Testbed;
use crate::HarnessError;

/// Every parameter `./cliutil` understands. `None` means "use the helper's default".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clientcnt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edgecnt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keycnt: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipf_alpha: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_reqcnt_scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stresstest_duration_sec: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_clientedge_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_crossedge_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_edgecloud_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_clientedge_lbound_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_clientedge_avg_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_clientedge_rbound_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_crossedge_lbound_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_crossedge_avg_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_crossedge_rbound_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_edgecloud_lbound_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_edgecloud_avg_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_edgecloud_rbound_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation_latency_distname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_local_uncached_max_mem_usage_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_popularity_aggregation_max_mem_usage_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_popularity_collection_change_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_topk_edgecnt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_peredge_synced_victimcnt: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulator_randomness: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p2p_latency_mat_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realnet_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realnet_expname: Option<String>,
}

impl Settings {
    fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>, failure::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(failure::format_err!("settings serialized to {}", other)),
        }
    }

    fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, failure::Error> {
        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }

    /// Set one field from its textual form, e.g. `("capacity_mb", "2048")`. Unknown keys and
    /// values of the wrong type are rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), failure::Error> {
        let base = self.to_map()?;

        // Try the value as JSON first (numbers), then as a plain string.
        let mut candidates = vec![];
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(value) {
            candidates.push(parsed);
        }
        candidates.push(serde_json::Value::String(value.to_owned()));

        let mut last_err = None;
        for candidate in candidates {
            let mut map = base.clone();
            map.insert(key.to_owned(), candidate);
            match Self::from_map(map) {
                Ok(updated) => {
                    *self = updated;
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(match last_err {
            Some(err) => failure::format_err!("invalid setting `{}={}`: {}", key, value, err),
            None => failure::format_err!("invalid setting `{}={}`", key, value),
        })
    }

    /// Returns `self` with every field that is set in `other` replaced by `other`'s value.
    pub fn overlay(&self, other: &Settings) -> Result<Settings, failure::Error> {
        let mut map = self.to_map()?;
        map.extend(other.to_map()?);
        Self::from_map(map)
    }

    /// The arguments for `./cliutil`: `--key 'value'` for every field that is set, in key order.
    pub fn to_args(&self) -> Result<String, failure::Error> {
        let args: Vec<String> = self
            .to_map()?
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                format!("--{} {}", key, quote(value))
            })
            .collect();

        Ok(args.join(" "))
    }
}

/// The per-role command lines printed by `./cliutil`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliStrings {
    lines: HashMap<Role, String>,
}

impl CliStrings {
    /// Parse the output of `./cliutil`. For each role, the first line containing its prefix wins;
    /// the command line is whatever follows the prefix, trimmed.
    pub fn parse(output: &str) -> Self {
        let mut lines = HashMap::new();

        for line in output.lines() {
            for role in Role::ALL.iter().copied() {
                let prefix = match role.cli_prefix() {
                    Some(prefix) => prefix,
                    None => continue,
                };
                if lines.contains_key(&role) {
                    continue;
                }

                if let Some(start) = line.find(prefix) {
                    let cli = line[start + prefix.len()..].trim();
                    if !cli.is_empty() {
                        lines.insert(role, cli.to_owned());
                        break;
                    }
                }
            }
        }

        CliStrings { lines }
    }

    /// The command line to launch `role` with.
    pub fn get(&self, role: Role) -> Result<&str, failure::Error> {
        let source = role
            .cli_source()
            .ok_or_else(|| failure::format_err!("{} takes no composed command line", role))?;

        self.lines
            .get(&source)
            .map(String::as_str)
            .ok_or_else(|| {
                failure::format_err!(
                    "cliutil printed no `{}` line (needed for {})",
                    source.cli_prefix().unwrap_or("?"),
                    role
                )
            })
    }
}

/// Run `./cliutil` on the current machine and parse its output.
pub fn compose<S: Shell>(
    testbed: &Testbed<S>,
    settings: &Settings,
) -> Result<CliStrings, failure::Error> {
    let command = format!(
        "cd {} && {} {}",
        quote(&testbed.proj_dir),
        Role::CliUtil.binary(),
        settings.to_args()?
    );

    let out = testbed.shell.run(&command, true)?;
    if !out.success() {
        return Err(HarnessError::SpawnFailure {
            what: Role::CliUtil.name().to_owned(),
            errmsg: out.errstr(),
        }
        .into());
    }

    Ok(CliStrings::parse(&out.stdout))
}
