//! Loading replayed request traces into per-key statistics: value size and request count.
//!
//! Files are streamed line by line; only the per-key map is kept in memory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use failure::ResultExt;

use crate::logger;
use crate::HarnessError;

/// Buckets of the key size histogram: 1 B each, from 1 B to 1 KiB.
pub const KEY_HISTOGRAM_LEN: usize = 1024;

/// Buckets of the value size histogram: 1 KiB each, from 1 KiB to 10 MiB.
pub const VALUE_HISTOGRAM_LEN: usize = 10240;

/// The layout of one family of trace files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceFormat {
    /// Wikipedia CDN text: `relative_unix hashed_host_path_query response_size time_firstbyte`.
    WikiText,
    /// Wikipedia CDN images: `relative_unix hashed_path_query image_type response_size
    /// time_firstbyte`.
    WikiImage,
    /// Tencent photo cache: `timestamp photo_id format size_spec size hit terminal latency`.
    TencentPhoto,
}

impl TraceFormat {
    pub fn for_workload(workload: &str) -> Result<Self, failure::Error> {
        match workload {
            "zipf_wikitext" => Ok(TraceFormat::WikiText),
            "zipf_wikiimage" => Ok(TraceFormat::WikiImage),
            "zipf_tencentphoto1" | "zipf_tencentphoto2" => Ok(TraceFormat::TencentPhoto),
            _ => Err(failure::format_err!("unknown workload {}!", workload)),
        }
    }

    fn delimiter(self) -> char {
        match self {
            TraceFormat::WikiText | TraceFormat::WikiImage => '\t',
            TraceFormat::TencentPhoto => ' ',
        }
    }

    fn column_count(self) -> usize {
        match self {
            TraceFormat::WikiText => 4,
            TraceFormat::WikiImage => 5,
            TraceFormat::TencentPhoto => 8,
        }
    }

    fn value_size_column(self) -> usize {
        match self {
            TraceFormat::WikiText => 2,
            TraceFormat::WikiImage => 3,
            TraceFormat::TencentPhoto => 4,
        }
    }

    fn has_header(self) -> bool {
        self != TraceFormat::TencentPhoto
    }

    /// The key width recorded in the histogram. Wikipedia keys are 64-bit integers, and Tencent
    /// keys are 20-byte checksums.
    pub fn key_width(self) -> usize {
        match self {
            TraceFormat::WikiText | TraceFormat::WikiImage => 8,
            TraceFormat::TencentPhoto => 20,
        }
    }
}

/// The key bucket of a key `width` bytes wide.
pub fn key_bucket(width: usize) -> Result<usize, failure::Error> {
    if width < 1 {
        failure::bail!("invalid key size {}", width);
    }
    Ok((width - 1).min(KEY_HISTOGRAM_LEN - 1))
}

/// The value bucket of a value of `size` bytes. Empty values count as 1 KiB.
pub fn value_bucket(size: u64) -> usize {
    if size < 1 {
        0
    } else {
        (((size - 1) / 1024) as usize).min(VALUE_HISTOGRAM_LEN - 1)
    }
}

/// Per-key statistics of one workload.
pub struct TraceLoader {
    workload: String,
    format: TraceFormat,
    /// key -> (value size, frequency)
    stats: HashMap<String, (u32, u64)>,
}

impl TraceLoader {
    pub fn new(workload: &str) -> Result<Self, failure::Error> {
        Ok(TraceLoader {
            workload: workload.to_owned(),
            format: TraceFormat::for_workload(workload)?,
            stats: HashMap::new(),
        })
    }

    /// Load `files` (relative to `dir`) in order.
    pub fn load<P: AsRef<Path>>(
        workload: &str,
        dir: &Path,
        files: &[P],
    ) -> Result<Self, failure::Error> {
        let mut loader = Self::new(workload)?;

        if !dir.exists() {
            failure::bail!(
                "directory {} does not exist for workload {}!",
                dir.display(),
                workload
            );
        }

        for file in files {
            let path = dir.join(file);
            if !path.exists() {
                failure::bail!(
                    "file {} does not exist for workload {}!",
                    path.display(),
                    workload
                );
            }

            logger::prompt(&format!(
                "loading trace file {} for workload {}...",
                path.display(),
                workload
            ));
            let f = File::open(&path).with_context(|_| format!("opening {}", path.display()))?;
            loader.load_reader(BufReader::new(f), &path.display().to_string())?;
        }

        Ok(loader)
    }

    /// Load one trace file. `name` is used in error messages.
    pub fn load_reader<R: BufRead>(&mut self, reader: R, name: &str) -> Result<(), failure::Error> {
        let format = self.format;
        let malformed = |line: usize, reason: String| -> failure::Error {
            HarnessError::TraceMalformed {
                file: name.to_owned(),
                line,
                reason,
            }
            .into()
        };

        for (i, line) in reader.lines().enumerate() {
            let lineno = i + 1;
            let line = line.with_context(|_| format!("reading {}", name))?;

            if lineno == 1 && format.has_header() {
                continue;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let columns: Vec<&str> = line.split(format.delimiter()).collect();
            if columns.len() != format.column_count() {
                return Err(malformed(
                    lineno,
                    format!(
                        "invalid column count {} (expected {}) for workload {}",
                        columns.len(),
                        format.column_count(),
                        self.workload
                    ),
                ));
            }

            let key = match format {
                TraceFormat::WikiText | TraceFormat::WikiImage => columns[1]
                    .parse::<i64>()
                    .map_err(|e| malformed(lineno, format!("key {:?}: {}", columns[1], e)))?
                    .to_string(),
                TraceFormat::TencentPhoto => columns[1].to_owned(),
            };

            let size_col = format.value_size_column();
            let value_size = columns[size_col]
                .parse::<u32>()
                .map_err(|e| malformed(lineno, format!("value size {:?}: {}", columns[size_col], e)))?;

            if format == TraceFormat::TencentPhoto {
                // Only JPG (0) and WebP (5) photos.
                let img_format = columns[2]
                    .parse::<u32>()
                    .map_err(|e| malformed(lineno, format!("image format {:?}: {}", columns[2], e)))?;
                if img_format != 0 && img_format != 5 {
                    continue;
                }
            }

            self.record(key, value_size);
        }

        Ok(())
    }

    /// The first request for a key fixes its value size.
    fn record(&mut self, key: String, value_size: u32) {
        self.stats
            .entry(key)
            .and_modify(|(_, freq)| *freq += 1)
            .or_insert((value_size, 1));
    }

    pub fn key_count(&self) -> usize {
        self.stats.len()
    }

    pub fn get(&self, key: &str) -> Option<(u32, u64)> {
        self.stats.get(key).copied()
    }

    /// All frequencies, most frequent first. The rank of a key is its index + 1.
    pub fn sorted_frequencies(&self) -> Vec<u64> {
        logger::prompt(&format!(
            "sorting frequency list for workload {}...",
            self.workload
        ));

        let mut freqs: Vec<u64> = self.stats.values().map(|&(_, freq)| freq).collect();
        freqs.sort_unstable_by(|a, b| b.cmp(a));

        logger::dump(&format!("total opcnt: {}", freqs.iter().sum::<u64>()));
        freqs
    }

    pub fn key_size_histogram(&self) -> Result<Vec<u32>, failure::Error> {
        let width = self.format.key_width();
        let bucket = key_bucket(width)?;

        let mut histogram = vec![0u32; KEY_HISTOGRAM_LEN];
        histogram[bucket] = saturate(self.stats.len() as u64);

        logger::dump(&format!(
            "keycnt: {}; keysize min/max/avg: {}/{}/{}",
            self.stats.len(),
            width,
            width,
            width
        ));
        Ok(histogram)
    }

    pub fn value_size_histogram(&self) -> Vec<u32> {
        let mut histogram = vec![0u32; VALUE_HISTOGRAM_LEN];
        let (mut min, mut max, mut sum) = (u64::MAX, 0u64, 0u64);

        for &(size, _) in self.stats.values() {
            let size = u64::from(size);
            let bucket = &mut histogram[value_bucket(size)];
            *bucket = bucket.saturating_add(1);

            min = min.min(size);
            max = max.max(size);
            sum += size;
        }

        if !self.stats.is_empty() {
            logger::dump(&format!(
                "keycnt: {}; valsize min/max/avg: {}/{}/{}",
                self.stats.len(),
                min,
                max,
                sum as f64 / self.stats.len() as f64
            ));
        }
        histogram
    }
}

fn saturate(n: u64) -> u32 {
    if n > u64::from(u32::MAX) {
        u32::MAX
    } else {
        n as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn overflow_policy() {
        assert_eq!(key_bucket(4096).unwrap(), 1023);
        assert_eq!(key_bucket(1).unwrap(), 0);
        assert_eq!(key_bucket(8).unwrap(), 7);
        assert!(key_bucket(0).is_err());

        assert_eq!(value_bucket(20 * 1024 * 1024), 10239);
        assert_eq!(value_bucket(0), 0);
        assert_eq!(value_bucket(1024), 0);
        assert_eq!(value_bucket(1025), 1);
        assert_eq!(value_bucket(10 * 1024 * 1024), 10239);
    }

    #[test]
    fn wikitext_counts_requests() {
        let trace = "relative_unix\thashed_host_path_query\tresponse_size\ttime_firstbyte\n\
                     0\t17\t2048\t0.1\n\
                     1\t42\t100\t0.2\n\
                     2\t17\t9999\t0.3\n\
                     3\t17\t2048\t0.1\n";
        let mut loader = TraceLoader::new("zipf_wikitext").unwrap();
        loader.load_reader(Cursor::new(trace), "wiki.tsv").unwrap();

        assert_eq!(loader.key_count(), 2);
        assert_eq!(loader.get("17"), Some((2048, 3)));
        assert_eq!(loader.get("42"), Some((100, 1)));
        assert_eq!(loader.sorted_frequencies(), vec![3, 1]);

        let keys = loader.key_size_histogram().unwrap();
        assert_eq!(keys.len(), KEY_HISTOGRAM_LEN);
        assert_eq!(keys[7], 2);

        let values = loader.value_size_histogram();
        assert_eq!(values.len(), VALUE_HISTOGRAM_LEN);
        assert_eq!(values[0], 1);
        assert_eq!(values[1], 1);
    }

    #[test]
    fn tencent_filters_formats() {
        let trace = "1 aaaa 0 x 5000 1 2 3\n\
                     2 bbbb 3 x 5000 1 2 3\n\
                     3 cccc 5 x 100 1 2 3\n\
                     4 aaaa 0 x 5000 1 2 3\n";
        let mut loader = TraceLoader::new("zipf_tencentphoto2").unwrap();
        loader.load_reader(Cursor::new(trace), "tencent.log").unwrap();

        assert_eq!(loader.key_count(), 2);
        assert_eq!(loader.get("aaaa"), Some((5000, 2)));
        assert_eq!(loader.get("bbbb"), None);
        assert_eq!(loader.key_size_histogram().unwrap()[19], 2);
    }

    #[test]
    fn wrong_column_count_is_malformed() {
        let trace = "h1\th2\th3\th4\th5\n1\t2\t3\n";
        let mut loader = TraceLoader::new("zipf_wikiimage").unwrap();
        let err = loader.load_reader(Cursor::new(trace), "img.tsv").unwrap_err();
        match err.downcast_ref::<HarnessError>() {
            Some(HarnessError::TraceMalformed { line, file, .. }) => {
                assert_eq!(*line, 2);
                assert_eq!(file, "img.tsv");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn non_numeric_key_is_malformed() {
        let trace = "header\n0\tabc\t12\t0.1\n";
        let mut loader = TraceLoader::new("zipf_wikitext").unwrap();
        assert!(loader.load_reader(Cursor::new(trace), "t").is_err());
    }

    #[test]
    fn unknown_workload() {
        assert!(TraceLoader::new("facebook").is_err());
    }

    #[test]
    fn load_checks_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.tsv"),
            "h\th\th\th\n0\t1\t10\t0\n0\t1\t10\t0\n",
        )
        .unwrap();

        let loader = TraceLoader::load("zipf_wikitext", dir.path(), &["a.tsv"]).unwrap();
        assert_eq!(loader.get("1"), Some((10, 2)));

        assert!(TraceLoader::load("zipf_wikitext", dir.path(), &["missing.tsv"]).is_err());
        assert!(TraceLoader::load("zipf_wikitext", &dir.path().join("nope"), &["a.tsv"]).is_err());
    }
}
