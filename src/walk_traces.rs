//! List the files of a trace directory for `config.json`, e.g. for
//! `trace_dirpath_relative_wikitext_trace_filepaths`.

use std::path::{Path, PathBuf};

use clap::clap_app;

use walkdir::WalkDir;

use crate::config::ConfigStore;
use crate::logger;

/// The files under `trace_dir/workload_dir`, relative to `trace_dir` and sorted. With a `limit`,
/// files are taken in walk order until their total size would exceed it.
pub fn walk(
    trace_dir: &Path,
    workload_dir: &str,
    limit: Option<u64>,
) -> Result<Vec<String>, failure::Error> {
    let root = trace_dir.join(workload_dir);
    if !root.is_dir() {
        failure::bail!("{} is not a directory", root.display());
    }

    let mut total = 0u64;
    let mut files = vec![];
    for entry in WalkDir::new(&root).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        total += entry.metadata()?.len();
        if limit.map_or(false, |limit| total > limit) {
            logger::warn(&format!(
                "stop at {}: the total size exceeds {} bytes",
                entry.path().display(),
                limit.unwrap_or_default()
            ));
            break;
        }

        let relative = entry.path().strip_prefix(trace_dir)?;
        files.push(relative.display().to_string());
    }

    files.sort();
    Ok(files)
}

pub fn cli_options() -> clap::App<'static, 'static> {
    clap_app! { walk_traces =>
        (about: "Print the files of a trace directory as a JSON list for config.json.")
        (@setting ArgRequiredElseHelp)
        (@setting DisableVersion)
        (@arg DIR: +required +takes_value
         "The workload directory relative to trace_dirpath (e.g. wikitext or tencent/dataset1)")
        (@arg LIMIT: --limit +takes_value {crate::cli::is::<u64>}
         "Stop once the files add up to more than this many bytes")
        (@arg CONFIG: --config +takes_value
         "The configuration file. By default, config.json in the current directory or its \
          closest ancestor that has one.")
    }
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let dir = sub_m.value_of("DIR").unwrap();
    let limit = sub_m.value_of("LIMIT").map(|s| s.parse::<u64>().unwrap());
    let config = ConfigStore::locate(sub_m.value_of("CONFIG").map(Path::new))?;

    let trace_dir: PathBuf = config.get_path("trace_dirpath")?;
    let files = walk(&trace_dir, dir, limit)?;

    logger::dump(&format!("# of files: {}", files.len()));
    println!("{}", serde_json::to_string(&files)?);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn traces() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let wiki = dir.path().join("wikitext");
        std::fs::create_dir_all(wiki.join("part2")).unwrap();
        std::fs::write(wiki.join("cache-t-01"), vec![0u8; 10]).unwrap();
        std::fs::write(wiki.join("cache-t-00"), vec![0u8; 10]).unwrap();
        std::fs::write(wiki.join("part2").join("cache-t-02"), vec![0u8; 10]).unwrap();
        dir
    }

    #[test]
    fn relative_and_sorted() {
        let dir = traces();
        assert_eq!(
            walk(dir.path(), "wikitext", None).unwrap(),
            vec![
                "wikitext/cache-t-00",
                "wikitext/cache-t-01",
                "wikitext/part2/cache-t-02"
            ]
        );
    }

    #[test]
    fn limit_stops_before_overflowing_file() {
        let dir = traces();
        assert_eq!(
            walk(dir.path(), "wikitext", Some(25)).unwrap(),
            vec!["wikitext/cache-t-00", "wikitext/cache-t-01"]
        );
        assert!(walk(dir.path(), "wikitext", Some(5)).unwrap().is_empty());
    }

    #[test]
    fn missing_directory() {
        let dir = traces();
        assert!(walk(dir.path(), "tencent", None).is_err());
    }
}
