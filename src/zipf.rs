//! Fitting a Zipf exponent to a rank/frequency curve.
//!
//! With frequencies normalized by the most popular key, the model is `f(rank) = rank^-a`, so
//! only the exponent `a` is fitted, by Levenberg-Marquardt least squares.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// At most this many points take part in the fit.
pub const MAX_FIT_POINTS: usize = 1_000_000;

const INITIAL_EXPONENT: f64 = 1.1;
const MAX_ITERATIONS: usize = 200;
const STEP_TOLERANCE: f64 = 1e-10;

/// Fit the exponent of `freqs`, sorted most frequent first.
pub fn fit_exponent(freqs: &[u64]) -> Result<f64, failure::Error> {
    fit_exponent_with_limit(freqs, MAX_FIT_POINTS)
}

/// Like `fit_exponent`, subsampling (deterministically) to at most `limit` points.
pub fn fit_exponent_with_limit(freqs: &[u64], limit: usize) -> Result<f64, failure::Error> {
    let top = match freqs.first() {
        Some(&top) if top > 0 => top as f64,
        Some(_) => failure::bail!("the most popular key has zero frequency"),
        None => failure::bail!("cannot fit an exponent without any frequency"),
    };

    let points: Vec<(f64, f64)> = if freqs.len() > limit {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut idxes = rand::seq::index::sample(&mut rng, freqs.len(), limit).into_vec();
        idxes.sort_unstable();
        idxes
            .into_iter()
            .map(|i| ((i + 1) as f64, freqs[i] as f64 / top))
            .collect()
    } else {
        freqs
            .iter()
            .enumerate()
            .map(|(i, &f)| ((i + 1) as f64, f as f64 / top))
            .collect()
    };

    Ok(levenberg_marquardt(&points, INITIAL_EXPONENT))
}

fn cost(points: &[(f64, f64)], a: f64) -> f64 {
    points
        .iter()
        .map(|&(x, y)| {
            let r = x.powf(-a) - y;
            r * r
        })
        .sum()
}

fn levenberg_marquardt(points: &[(f64, f64)], mut a: f64) -> f64 {
    let mut lambda = 1e-3;
    let mut current = cost(points, a);

    for _ in 0..MAX_ITERATIONS {
        let (mut hessian, mut gradient) = (0.0, 0.0);
        for &(x, y) in points {
            let model = x.powf(-a);
            let jacobian = -x.ln() * model;
            hessian += jacobian * jacobian;
            gradient += jacobian * (model - y);
        }
        if hessian == 0.0 {
            break;
        }

        let delta = -gradient / (hessian * (1.0 + lambda));
        let candidate = cost(points, a + delta);
        if candidate < current {
            a += delta;
            current = candidate;
            lambda /= 10.0;
        } else {
            lambda *= 10.0;
        }

        if delta.abs() < STEP_TOLERANCE {
            break;
        }
    }

    a
}

#[cfg(test)]
mod test {
    use super::*;

    fn zipf_freqs(n: usize, a: f64) -> Vec<u64> {
        (1..=n)
            .map(|r| (1e12 * (r as f64).powf(-a)).round() as u64)
            .collect()
    }

    #[test]
    fn recovers_exponent() {
        let freqs = zipf_freqs(100_000, 1.2);
        let a = fit_exponent(&freqs).unwrap();
        assert!((a - 1.2).abs() < 0.02, "fitted {}", a);
    }

    #[test]
    fn recovers_exponent_from_subsample() {
        let freqs = zipf_freqs(200_000, 0.8);
        let a = fit_exponent_with_limit(&freqs, 50_000).unwrap();
        assert!((a - 0.8).abs() < 0.02, "fitted {}", a);

        // Same seed, same answer.
        assert_eq!(a, fit_exponent_with_limit(&freqs, 50_000).unwrap());
    }

    #[test]
    fn million_ranks_with_and_without_subsampling() {
        let freqs = zipf_freqs(1_000_000, 1.2);

        let full = fit_exponent(&freqs).unwrap();
        assert!((full - 1.2).abs() < 0.02, "fitted {}", full);

        let sampled = fit_exponent_with_limit(&freqs, 100_000).unwrap();
        assert!((sampled - 1.2).abs() < 0.02, "fitted {}", sampled);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(fit_exponent(&[]).is_err());
        assert!(fit_exponent(&[0, 0]).is_err());

        // A single key fits anything; the initial guess survives.
        assert_eq!(fit_exponent(&[7]).unwrap(), INITIAL_EXPONENT);
    }
}
