//! Expanding an experiment into its points and running each point at most once.
//!
//! A point is (round, cache, variant). Its log file path is a function of those three, and the
//! existence of that file means the point has already been run: re-running a script only runs
//! the points that are missing.

use std::path::{Path, PathBuf};

use failure::ResultExt;

use crate::cliutil::Settings;
use crate::logger;

/// One value of the per-script dimension (e.g. a capacity or a workload).
#[derive(Clone, Debug)]
pub struct Variant {
    /// Appended to the log file name, e.g. `8192` in `tmp_evaluator_for_covered_8192.out`.
    pub tag: Option<String>,
    /// Appended to the cache name in messages, e.g. ` w/ per-edge memory capacity 8192 MiB`.
    pub describe: String,
    /// Overlaid on the base settings.
    pub settings: Settings,
}

impl Variant {
    pub fn new<T: ToString, D: ToString>(tag: T, describe: D, settings: Settings) -> Self {
        Variant {
            tag: Some(tag.to_string()),
            describe: describe.to_string(),
            settings,
        }
    }

    /// The only variant of a script without an inner dimension.
    pub fn plain() -> Self {
        Variant {
            tag: None,
            describe: String::new(),
            settings: Settings::default(),
        }
    }
}

/// What an override gets to look at.
#[derive(Clone, Copy, Debug)]
pub struct PointContext<'a> {
    pub round: usize,
    pub cache: &'a str,
    pub tag: Option<&'a str>,
}

type Override = Box<dyn Fn(&PointContext<'_>, &mut Settings)>;

/// A fully specified run.
#[derive(Clone, Debug)]
pub struct Point {
    pub round: usize,
    pub cache: String,
    pub tag: Option<String>,
    pub describe: String,
    pub settings: Settings,
    pub log_path: PathBuf,
}

/// What `RunMatrix::execute` did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub skipped: usize,
    pub round_dirs: Vec<PathBuf>,
}

/// The points of one experiment script.
pub struct RunMatrix {
    script: String,
    log_root: PathBuf,
    rounds: usize,
    caches: Vec<String>,
    base: Settings,
    variants: Vec<Variant>,
    overrides: Vec<Override>,
    runner_label: String,
    summary_word: String,
}

impl RunMatrix {
    /// Points of `script` will log to `<log_root>/<script>/round<r>/`.
    pub fn new(script: &str, log_root: &Path, rounds: usize, base: Settings) -> Self {
        RunMatrix {
            script: script.to_owned(),
            log_root: log_root.to_path_buf(),
            rounds,
            caches: vec![],
            base,
            variants: vec![Variant::plain()],
            overrides: vec![],
            runner_label: "prototype".to_owned(),
            summary_word: "stable".to_owned(),
        }
    }

    pub fn caches<I, S>(mut self, caches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.caches = caches.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the inner dimension.
    pub fn variants(mut self, variants: Vec<Variant>) -> Self {
        self.variants = variants;
        self
    }

    /// A special case applied after the cache and variant settings.
    pub fn override_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&PointContext<'_>, &mut Settings) + 'static,
    {
        self.overrides.push(Box::new(f));
        self
    }

    /// What runs a point, as in "Run prototype of covered ...".
    pub fn runner_label(mut self, label: &str) -> Self {
        self.runner_label = label.to_owned();
        self
    }

    /// Which statistics the operator should look at afterwards, as in "Please check cache stable
    /// statistics ...".
    pub fn summary_word(mut self, word: &str) -> Self {
        self.summary_word = word.to_owned();
        self
    }

    pub fn round_dir(&self, round: usize) -> PathBuf {
        self.log_root
            .join(&self.script)
            .join(format!("round{}", round))
    }

    pub fn log_path(&self, round: usize, cache: &str, tag: Option<&str>) -> PathBuf {
        let name = match tag {
            Some(tag) => format!("tmp_evaluator_for_{}_{}.out", cache, tag),
            None => format!("tmp_evaluator_for_{}.out", cache),
        };
        self.round_dir(round).join(name)
    }

    /// All points, rounds outermost, then caches, then variants.
    pub fn points(&self) -> Result<Vec<Point>, failure::Error> {
        let mut points = vec![];

        for round in 0..self.rounds {
            for cache in &self.caches {
                for variant in &self.variants {
                    let mut settings = self.base.overlay(&variant.settings)?;
                    settings.cache_name = Some(cache.clone());

                    let ctx = PointContext {
                        round,
                        cache,
                        tag: variant.tag.as_deref(),
                    };
                    for f in &self.overrides {
                        f(&ctx, &mut settings);
                    }

                    points.push(Point {
                        round,
                        cache: cache.clone(),
                        tag: variant.tag.clone(),
                        describe: variant.describe.clone(),
                        settings,
                        log_path: self.log_path(round, cache, variant.tag.as_deref()),
                    });
                }
            }
        }

        Ok(points)
    }

    /// Run every point whose log file does not exist yet with `exec`. The settings of each point
    /// are written next to its log file (`<log>.params`) before it runs. The first failing point
    /// aborts the whole matrix.
    pub fn execute<F>(&self, mut exec: F) -> Result<RunSummary, failure::Error>
    where
        F: FnMut(&Point) -> Result<(), failure::Error>,
    {
        let mut summary = RunSummary::default();
        let points = self.points()?;

        for round in 0..self.rounds {
            let dir = self.round_dir(round);
            if !dir.exists() {
                logger::prompt(&format!(
                    "Create log dirpath {} for the current round {}...",
                    dir.display(),
                    round
                ));
            }
            std::fs::create_dir_all(&dir)
                .with_context(|_| format!("creating {}", dir.display()))?;
            summary.round_dirs.push(dir);

            for point in points.iter().filter(|p| p.round == round) {
                if point.log_path.exists() {
                    logger::prompt(&format!(
                        "Log filepath {} already exists, skip {}{} for the current round {}...",
                        point.log_path.display(),
                        point.cache,
                        point.describe,
                        round
                    ));
                    summary.skipped += 1;
                    continue;
                }

                write_params(point)?;

                logger::prompt(&format!(
                    "Run {} of {}{} for the current round {}...",
                    self.runner_label, point.cache, point.describe, round
                ));
                exec(point)?;
                summary.executed += 1;
            }
        }

        let dirs: Vec<String> = summary
            .round_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        logger::emphasize(&format!(
            "Please check cache {} statistics in log files (at the end of each log file) in the \
             following directories:\n{}",
            self.summary_word,
            dirs.join("\n")
        ));

        Ok(summary)
    }
}

/// Path of the settings record of a point.
pub fn params_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(".params");
    PathBuf::from(name)
}

fn write_params(point: &Point) -> Result<(), failure::Error> {
    let path = params_path(&point.log_path);
    let json = serde_json::to_string_pretty(&point.settings)?;
    std::fs::write(&path, json).with_context(|_| format!("writing {}", path.display()))?;
    Ok(())
}
