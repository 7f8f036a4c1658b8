//! Generate a symmetric matrix of pairwise network delays between cache nodes.
//!
//! The matrix is written as JSON (consumed by the simulator via `p2p_latency_mat_path`) together
//! with an SVG histogram of the off-diagonal delays.

use std::path::{Path, PathBuf};

use clap::clap_app;

use failure::ResultExt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as _, Normal, Pareto, Poisson, Uniform};

use serde_json::json;

use crate::logger;

/// Marks a pair of nodes that have no direct link.
pub const NO_LINK: u32 = u32::MAX;

const HISTOGRAM_BINS: usize = 30;
const PREVIEW_SIZE: usize = 10;

/// The distribution delays are drawn from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Distribution {
    /// Uniform over `[loc, loc + scale]`.
    Uniform { loc: f64, scale: f64 },
    Normal { mean: f64, std: f64 },
    Poisson { lambda: f64 },
    /// `low * (x + 1)` where `x` is Pareto with scale 1 and the given shape.
    LongTail { shape: f64 },
    /// Every pair is `NO_LINK`.
    MixedLink,
}

impl Distribution {
    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Uniform { .. } => "uniform",
            Distribution::Normal { .. } => "normal",
            Distribution::Poisson { .. } => "poisson",
            Distribution::LongTail { .. } => "long_tail",
            Distribution::MixedLink => "mixed_link",
        }
    }

    fn validate(&self) -> Result<(), failure::Error> {
        match *self {
            Distribution::Uniform { scale, .. } if !(scale > 0.0) => {
                failure::bail!("uniform scale must be positive (got {})", scale)
            }
            Distribution::Normal { std, .. } if !(std > 0.0) => {
                failure::bail!("normal std must be positive (got {})", std)
            }
            Distribution::Poisson { lambda } if !(lambda > 0.0) => {
                failure::bail!("poisson lambda must be positive (got {})", lambda)
            }
            Distribution::LongTail { shape } if !(shape > 0.0) => {
                failure::bail!("long_tail shape must be positive (got {})", shape)
            }
            _ => Ok(()),
        }
    }

    /// Adds the distribution-specific fields to the JSON `parameters` object.
    fn describe(&self, params: &mut serde_json::Map<String, serde_json::Value>) {
        match *self {
            Distribution::Uniform { loc, scale } => {
                params.insert("loc".into(), json!(loc));
                params.insert("scale".into(), json!(scale));
            }
            Distribution::Normal { mean, std } => {
                params.insert("mean".into(), json!(mean));
                params.insert("std".into(), json!(std));
            }
            Distribution::Poisson { lambda } => {
                params.insert("lambda".into(), json!(lambda));
            }
            Distribution::LongTail { shape } => {
                params.insert("shape".into(), json!(shape));
            }
            Distribution::MixedLink => {
                params.insert("type".into(), json!("full_INT_MAX"));
            }
        }
    }
}

/// A symmetric delay matrix in milliseconds with a zero diagonal.
#[derive(Clone, Debug)]
pub struct DelayMatrix {
    pub distribution: Distribution,
    pub low: u32,
    pub high: u32,
    pub rows: Vec<Vec<u32>>,
}

impl DelayMatrix {
    /// Draw the upper triangle from `distribution`, clip to `[low, high]` and mirror it.
    pub fn generate<R: Rng>(
        node_count: usize,
        distribution: Distribution,
        low: u32,
        high: u32,
        rng: &mut R,
    ) -> Result<Self, failure::Error> {
        if node_count < 2 {
            failure::bail!("node count must be at least 2 (got {})", node_count);
        }
        if low >= high {
            failure::bail!("low ({}) must be smaller than high ({})", low, high);
        }
        distribution.validate()?;

        let mut sampler = Sampler::new(distribution, low)?;
        let mut rows = vec![vec![0u32; node_count]; node_count];
        for i in 0..node_count {
            for j in (i + 1)..node_count {
                let value = match distribution {
                    Distribution::MixedLink => NO_LINK,
                    _ => clip(sampler.sample(rng), low, high),
                };
                rows[i][j] = value;
                rows[j][i] = value;
            }
        }

        Ok(DelayMatrix {
            distribution,
            low,
            high,
            rows,
        })
    }

    pub fn node_count(&self) -> usize {
        self.rows.len()
    }

    /// The mean of the off-diagonal entries.
    pub fn average_delay(&self) -> f64 {
        let n = self.node_count();
        let (mut sum, mut trace) = (0u128, 0u128);
        for (i, row) in self.rows.iter().enumerate() {
            for &v in row {
                sum += u128::from(v);
            }
            trace += u128::from(row[i]);
        }

        (sum - trace) as f64 / (n * (n - 1)) as f64
    }

    /// The upper-triangle entries, row by row.
    pub fn upper_triangle(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row[i + 1..].iter().copied())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut params = serde_json::Map::new();
        params.insert("low".into(), json!(self.low));
        params.insert("high".into(), json!(self.high));
        self.distribution.describe(&mut params);
        params.insert("average_delay".into(), json!(self.average_delay()));

        json!({
            "node_count": self.node_count(),
            "distribution": self.distribution.name(),
            "parameters": params,
            "delay_matrix": self.rows,
        })
    }

    pub fn save_json(&self, path: &Path) -> Result<(), failure::Error> {
        create_parent(path)?;
        std::fs::write(path, serde_json::to_string_pretty(&self.to_json())?)?;
        Ok(())
    }

    /// Render a histogram of the upper-triangle delays with a vertical line at the average.
    pub fn save_histogram(&self, path: &Path) -> Result<(), failure::Error> {
        use plotters::prelude::*;

        let values: Vec<u32> = self.upper_triangle().collect();
        let min = values.iter().copied().min().unwrap_or(0) as f64;
        let max = values.iter().copied().max().unwrap_or(0) as f64;
        let width = ((max - min) / HISTOGRAM_BINS as f64).max(1.0);

        let mut counts = vec![0u32; HISTOGRAM_BINS];
        for &v in &values {
            let bin = (((v as f64 - min) / width) as usize).min(HISTOGRAM_BINS - 1);
            counts[bin] += 1;
        }
        let top = counts.iter().copied().max().unwrap_or(0) + 1;
        let x_max = min + width * HISTOGRAM_BINS as f64;

        create_parent(path)?;
        let root = SVGBackend::new(path, (800, 600)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| failure::format_err!("{:?}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(min..x_max, 0u32..top)
            .map_err(|e| failure::format_err!("{:?}", e))?;

        chart
            .draw_series(counts.iter().enumerate().map(|(bin, &count)| {
                let x0 = min + width * bin as f64;
                Rectangle::new([(x0, 0), (x0 + width, count)], BLUE.filled())
            }))
            .map_err(|e| failure::format_err!("{:?}", e))?;

        let avg = self.average_delay();
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(avg, 0), (avg, top)],
                RED,
            )))
            .map_err(|e| failure::format_err!("{:?}", e))?;

        root.present()
            .map_err(|e| failure::format_err!("{:?}", e))?;
        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<(), failure::Error> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|_| format!("creating {}", dir.display()))?;
        }
    }
    Ok(())
}

/// `<output>.<ext>`, keeping any dot already in the file name.
pub fn output_path(output: &Path, ext: &str) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn clip(value: f64, low: u32, high: u32) -> u32 {
    value.round().max(low as f64).min(high as f64) as u32
}

enum Sampler {
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
    Poisson(Poisson<f64>),
    LongTail(Pareto<f64>, f64),
    Constant,
}

impl Sampler {
    fn new(distribution: Distribution, low: u32) -> Result<Self, failure::Error> {
        Ok(match distribution {
            Distribution::Uniform { loc, scale } => {
                Sampler::Uniform(Uniform::new_inclusive(loc, loc + scale))
            }
            Distribution::Normal { mean, std } => Sampler::Normal(
                Normal::new(mean, std).map_err(|e| failure::format_err!("{:?}", e))?,
            ),
            Distribution::Poisson { lambda } => Sampler::Poisson(
                Poisson::new(lambda).map_err(|e| failure::format_err!("{:?}", e))?,
            ),
            Distribution::LongTail { shape } => Sampler::LongTail(
                Pareto::new(1.0, shape).map_err(|e| failure::format_err!("{:?}", e))?,
                low as f64,
            ),
            Distribution::MixedLink => Sampler::Constant,
        })
    }

    fn sample<R: Rng>(&mut self, rng: &mut R) -> f64 {
        match self {
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::Normal(d) => d.sample(rng),
            Sampler::Poisson(d) => d.sample(rng),
            Sampler::LongTail(d, low) => *low * (d.sample(rng) + 1.0),
            Sampler::Constant => NO_LINK as f64,
        }
    }
}

pub fn cli_options() -> clap::App<'static, 'static> {
    clap_app! { gen_delay_matrix =>
        (about: "Generate a symmetric delay matrix (ms) between cache nodes, as JSON plus an SVG \
                 histogram.")
        (@setting ArgRequiredElseHelp)
        (@setting DisableVersion)
        (@arg OUTPUT: +required +takes_value
         "The output path without extension; <OUTPUT>.json and <OUTPUT>.svg are written")
        (@arg NODES: -n --nodes +takes_value {crate::cli::is::<usize>}
         "The number of nodes (default: 128)")
        (@arg DIST: -d --distribution +takes_value
         possible_values(&["uniform", "normal", "poisson", "long_tail", "mixed_link"])
         "The delay distribution (default: uniform)")
        (@arg LOW: --low +takes_value {crate::cli::is::<u32>}
         "The lower bound of delays (default: 1000)")
        (@arg HIGH: --high +takes_value {crate::cli::is::<u32>}
         "The upper bound of delays (default: 5000)")
        (@arg LOC: --loc +takes_value {crate::cli::is::<f64>}
         "uniform: the lower end (default: LOW)")
        (@arg SCALE: --scale +takes_value {crate::cli::is::<f64>}
         "uniform: the width (default: HIGH - LOW)")
        (@arg MEAN: --mean +takes_value {crate::cli::is::<f64>}
         "normal: the mean (default: midpoint of LOW and HIGH)")
        (@arg STD: --std +takes_value {crate::cli::is::<f64>}
         "normal: the standard deviation (default: (HIGH - LOW) / 6)")
        (@arg LAMBDA: --lambda +takes_value {crate::cli::is::<f64>}
         "poisson: the mean (default: midpoint of LOW and HIGH)")
        (@arg SHAPE: --shape +takes_value {crate::cli::is::<f64>}
         "long_tail: the Pareto shape (default: 1.2)")
        (@arg SEED: --seed +takes_value {crate::cli::is::<u64>}
         "Seed the generator for a reproducible matrix")
    }
}

fn float_or(sub_m: &clap::ArgMatches<'_>, name: &str, default: f64) -> f64 {
    sub_m
        .value_of(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let output = PathBuf::from(sub_m.value_of("OUTPUT").unwrap());
    let nodes = sub_m
        .value_of("NODES")
        .map(|s| s.parse::<usize>().unwrap())
        .unwrap_or(128);
    let low = sub_m
        .value_of("LOW")
        .map(|s| s.parse::<u32>().unwrap())
        .unwrap_or(1000);
    let high = sub_m
        .value_of("HIGH")
        .map(|s| s.parse::<u32>().unwrap())
        .unwrap_or(5000);
    let (lo, hi) = (low as f64, high as f64);

    let distribution = match sub_m.value_of("DIST").unwrap_or("uniform") {
        "uniform" => Distribution::Uniform {
            loc: float_or(sub_m, "LOC", lo),
            scale: float_or(sub_m, "SCALE", hi - lo),
        },
        "normal" => Distribution::Normal {
            mean: float_or(sub_m, "MEAN", (lo + hi) / 2.0),
            std: float_or(sub_m, "STD", (hi - lo) / 6.0),
        },
        "poisson" => Distribution::Poisson {
            lambda: float_or(sub_m, "LAMBDA", (lo + hi) / 2.0),
        },
        "long_tail" => Distribution::LongTail {
            shape: float_or(sub_m, "SHAPE", 1.2),
        },
        "mixed_link" => Distribution::MixedLink,
        _ => unreachable!(),
    };

    let mut rng = match sub_m.value_of("SEED") {
        Some(seed) => SmallRng::seed_from_u64(seed.parse::<u64>().unwrap()),
        None => SmallRng::from_entropy(),
    };

    let matrix = DelayMatrix::generate(nodes, distribution, low, high, &mut rng)?;

    logger::dump(&format!(
        "first {} rows of the {}x{} matrix:",
        PREVIEW_SIZE.min(nodes),
        nodes,
        nodes
    ));
    for row in matrix.rows.iter().take(PREVIEW_SIZE) {
        let cells: Vec<String> = row.iter().take(PREVIEW_SIZE).map(u32::to_string).collect();
        logger::dump(&cells.join(" "));
    }
    logger::dump(&format!("average delay: {:.2} ms", matrix.average_delay()));

    let json_path = output_path(&output, "json");
    matrix.save_json(&json_path)?;
    logger::emphasize(&format!("delay matrix saved to {}", json_path.display()));

    let svg_path = output_path(&output, "svg");
    matrix.save_histogram(&svg_path)?;
    logger::emphasize(&format!("histogram saved to {}", svg_path.display()));

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn assert_symmetric(m: &DelayMatrix) {
        let n = m.node_count();
        for i in 0..n {
            assert_eq!(m.rows[i][i], 0);
            for j in 0..n {
                assert_eq!(m.rows[i][j], m.rows[j][i]);
            }
        }
    }

    #[test]
    fn uniform_small_matrix() {
        let dist = Distribution::Uniform {
            loc: 2000.0,
            scale: 10000.0,
        };
        let m = DelayMatrix::generate(4, dist, 2000, 12000, &mut rng()).unwrap();

        assert_symmetric(&m);
        assert!(m.upper_triangle().all(|v| v >= 2000 && v <= 12000));
        assert_eq!(m.upper_triangle().count(), 6);

        let json = m.to_json();
        assert_eq!(json["node_count"], 4);
        assert_eq!(json["distribution"], "uniform");
        assert_eq!(json["parameters"]["low"], 2000);
        assert_eq!(json["parameters"]["scale"], 10000.0);
        assert_eq!(json["delay_matrix"][1][0], json["delay_matrix"][0][1]);
    }

    #[test]
    fn every_distribution_stays_in_bounds() {
        let dists = [
            Distribution::Normal {
                mean: 3000.0,
                std: 5000.0,
            },
            Distribution::Poisson { lambda: 3000.0 },
            Distribution::LongTail { shape: 1.2 },
        ];
        for &dist in &dists {
            let m = DelayMatrix::generate(16, dist, 1000, 5000, &mut rng()).unwrap();
            assert_symmetric(&m);
            assert!(
                m.upper_triangle().all(|v| v >= 1000 && v <= 5000),
                "{} out of bounds",
                dist.name()
            );
        }
    }

    #[test]
    fn mixed_link_has_no_links() {
        let m = DelayMatrix::generate(3, Distribution::MixedLink, 1, u32::MAX, &mut rng()).unwrap();
        assert_symmetric(&m);
        assert!(m.upper_triangle().all(|v| v == NO_LINK));
        assert_eq!(m.average_delay(), NO_LINK as f64);
        assert_eq!(m.to_json()["parameters"]["type"], "full_INT_MAX");
    }

    #[test]
    fn average_excludes_diagonal() {
        let m = DelayMatrix {
            distribution: Distribution::MixedLink,
            low: 0,
            high: 10,
            rows: vec![vec![0, 2, 4], vec![2, 0, 6], vec![4, 6, 0]],
        };
        assert_eq!(m.average_delay(), 4.0);
    }

    #[test]
    fn invalid_inputs() {
        let dist = Distribution::Uniform {
            loc: 0.0,
            scale: 1.0,
        };
        assert!(DelayMatrix::generate(1, dist, 0, 10, &mut rng()).is_err());
        assert!(DelayMatrix::generate(4, dist, 10, 10, &mut rng()).is_err());

        let bad = Distribution::Uniform {
            loc: 0.0,
            scale: 0.0,
        };
        assert!(DelayMatrix::generate(4, bad, 0, 10, &mut rng()).is_err());
        assert!(
            DelayMatrix::generate(4, Distribution::Poisson { lambda: -1.0 }, 0, 10, &mut rng())
                .is_err()
        );
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let dist = Distribution::LongTail { shape: 1.5 };
        let a = DelayMatrix::generate(8, dist, 100, 900, &mut SmallRng::seed_from_u64(7)).unwrap();
        let b = DelayMatrix::generate(8, dist, 100, 900, &mut SmallRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn writes_json_and_svg() {
        let dir = tempfile::tempdir().unwrap();
        let dist = Distribution::Uniform {
            loc: 10.0,
            scale: 90.0,
        };
        let m = DelayMatrix::generate(5, dist, 10, 100, &mut rng()).unwrap();

        let json_path = dir.path().join("mat.json");
        m.save_json(&json_path).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back["node_count"], 5);

        let svg_path = dir.path().join("mat.svg");
        m.save_histogram(&svg_path).unwrap();
        assert!(std::fs::read_to_string(&svg_path).unwrap().contains("<svg"));
    }

    #[test]
    fn missing_output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let m = DelayMatrix::generate(3, Distribution::MixedLink, 1, 2, &mut rng()).unwrap();

        let output = dir.path().join("results").join("d3");
        m.save_json(&output_path(&output, "json")).unwrap();
        m.save_histogram(&output_path(&output, "svg")).unwrap();

        assert!(dir.path().join("results/d3.json").is_file());
        assert!(dir.path().join("results/d3.svg").is_file());
    }

    #[test]
    fn output_keeps_dotted_names() {
        assert_eq!(
            output_path(Path::new("out/lat_2.5ms"), "json"),
            PathBuf::from("out/lat_2.5ms.json")
        );
        assert_eq!(output_path(Path::new("d4"), "svg"), PathBuf::from("d4.svg"));
    }
}
