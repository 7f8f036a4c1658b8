//! The characteristics file of a trace: Zipf exponent plus key and value size histograms.
//!
//! Layout (all little-endian): `f64` exponent, `u32` key bucket count followed by that many
//! `u32`s, then `u32` value bucket count followed by that many `u32`s.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use failure::ResultExt;

#[derive(Clone, Debug, PartialEq)]
pub struct Characteristics {
    pub zipf_exponent: f64,
    pub key_histogram: Vec<u32>,
    pub value_histogram: Vec<u32>,
}

impl Characteristics {
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), failure::Error> {
        w.write_all(&self.zipf_exponent.to_le_bytes())?;
        write_histogram(&mut w, &self.key_histogram)?;
        write_histogram(&mut w, &self.value_histogram)?;
        w.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self, failure::Error> {
        let mut buf = [0u8; 8];
        r.read_exact(&mut buf)
            .context("reading the zipf exponent")?;
        let zipf_exponent = f64::from_le_bytes(buf);

        let key_histogram = read_histogram(&mut r).context("reading the key size histogram")?;
        let value_histogram =
            read_histogram(&mut r).context("reading the value size histogram")?;

        Ok(Characteristics {
            zipf_exponent,
            key_histogram,
            value_histogram,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), failure::Error> {
        let f = File::create(path).with_context(|_| format!("creating {}", path.display()))?;
        self.write_to(BufWriter::new(f))
    }

    pub fn load(path: &Path) -> Result<Self, failure::Error> {
        let f = File::open(path).with_context(|_| format!("opening {}", path.display()))?;
        Self::read_from(BufReader::new(f))
    }
}

fn write_histogram<W: Write>(w: &mut W, histogram: &[u32]) -> Result<(), failure::Error> {
    if histogram.len() > u32::MAX as usize {
        failure::bail!("histogram with {} buckets is too long", histogram.len());
    }

    w.write_all(&(histogram.len() as u32).to_le_bytes())?;
    for count in histogram {
        w.write_all(&count.to_le_bytes())?;
    }
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, failure::Error> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_histogram<R: Read>(r: &mut R) -> Result<Vec<u32>, failure::Error> {
    let len = read_u32(r)? as usize;
    (0..len).map(|_| read_u32(r)).collect()
}
