//! Pull the average latency out of every experiment log under a log root.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::clap_app;

use failure::ResultExt;

use walkdir::WalkDir;

use crate::logger;

pub const STATISTICS_HEADER: &str = "[Final Stresstest Statistics]";
pub const AVG_LATENCY_LABEL: &str = "Avg Latency (ms)";

/// Scan `reader` for the final statistics block and return the average latency field.
pub fn avg_latency<R: BufRead>(reader: R) -> Result<Option<String>, failure::Error> {
    let mut in_block = false;
    let mut header_seen = false;

    for line in reader.lines() {
        let line = line?;

        if header_seen {
            let fields: Vec<&str> = line.split('|').filter(|f| !f.is_empty()).collect();
            return Ok(fields.get(1).map(|f| f.trim().to_owned()));
        }

        if !in_block {
            in_block = line.contains(STATISTICS_HEADER);
        } else if line.contains(AVG_LATENCY_LABEL) {
            header_seen = true;
        }
    }

    Ok(None)
}

/// The files of every `round*` directory directly under `root`, sorted.
pub fn round_files(root: &Path) -> Result<Vec<PathBuf>, failure::Error> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = entry?;
        let is_round = entry.file_type().is_dir()
            && entry.file_name().to_string_lossy().starts_with("round");
        if !is_round {
            continue;
        }

        for file in WalkDir::new(entry.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let file = file?;
            if file.file_type().is_file() {
                files.push(file.into_path());
            }
        }
    }

    Ok(files)
}

/// `(file name, avg latency)` for every log that has the statistics block.
pub fn scrape(root: &Path) -> Result<Vec<(String, String)>, failure::Error> {
    if !root.is_dir() {
        failure::bail!("{} is not a directory", root.display());
    }

    let mut results = Vec::new();
    for path in round_files(root)? {
        let f = File::open(&path).with_context(|_| format!("opening {}", path.display()))?;
        let value = avg_latency(BufReader::new(f))
            .with_context(|_| format!("reading {}", path.display()))?;

        match value {
            Some(value) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                results.push((name, value));
            }
            None => log::debug!("no statistics in {}", path.display()),
        }
    }

    Ok(results)
}

pub fn cli_options() -> clap::App<'static, 'static> {
    clap_app! { scrape_results =>
        (about: "Print the average latency of every experiment log under a log root.")
        (@setting ArgRequiredElseHelp)
        (@setting DisableVersion)
        (@arg ROOT: +required +takes_value
         "The log root, i.e., the directory holding the round* directories")
    }
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let root = Path::new(sub_m.value_of("ROOT").unwrap());

    let results = scrape(root)?;
    for (name, value) in &results {
        println!("{} | {}", name, value);
    }
    logger::dump(&format!("{} log files scraped", results.len()));

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const LOG: &str = "some startup noise\n\
                       [Final Stresstest Statistics]\n\
                       | Cache | Avg Latency (ms) | Hit Ratio |\n\
                       |  | 42.7 | 99 |\n\
                       trailing\n";

    #[test]
    fn extracts_second_field() {
        assert_eq!(
            avg_latency(LOG.as_bytes()).unwrap(),
            Some("42.7".to_owned())
        );
    }

    #[test]
    fn label_before_block_is_ignored() {
        let log = "| Avg Latency (ms) |\n| x | 1.0 |\n";
        assert_eq!(avg_latency(log.as_bytes()).unwrap(), None);

        let truncated = "[Final Stresstest Statistics]\n| Avg Latency (ms) |\n";
        assert_eq!(avg_latency(truncated.as_bytes()).unwrap(), None);
    }

    #[test]
    fn five_rounds_of_twelve_logs() {
        let dir = tempfile::tempdir().unwrap();
        for round in 0..5 {
            let round_dir = dir.path().join(format!("round{}", round));
            std::fs::create_dir(&round_dir).unwrap();
            for i in 0..12 {
                std::fs::write(round_dir.join(format!("covered_{:02}.log", i)), LOG).unwrap();
            }
            // No statistics block.
            std::fs::write(round_dir.join("covered_00.log.params"), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("plots")).unwrap();
        std::fs::write(dir.path().join("plots").join("x.log"), LOG).unwrap();

        let results = scrape(dir.path()).unwrap();
        assert_eq!(results.len(), 60);
        assert_eq!(results[0], ("covered_00.log".to_owned(), "42.7".to_owned()));
        assert!(results.iter().all(|(_, v)| v == "42.7"));
    }

    #[test]
    fn missing_root() {
        assert!(scrape(Path::new("/nonexistent/log/root")).is_err());
    }
}
