//! Uneven amount splitting via Dirichlet shares

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Dirichlet;

use crate::error::{Error, Result};

// Shares are rounded to this precision; the last share absorbs the
// accumulated rounding so the sum stays exact
const AMOUNT_PRECISION: f64 = 1e6;

/// Probability that a trade of this size gets split at all
pub fn split_probability(amount: f64, reference_amount: f64) -> f64 {
    if reference_amount <= 0.0 {
        return 0.0;
    }
    (amount / reference_amount).min(1.0)
}

/// Draw `k` uneven sub-amounts summing exactly to `total`
///
/// Concentration parameters are drawn uniformly from [0.5, 1.5] so shares
/// are uneven without producing absurd outliers.
pub fn split_amounts(rng: &mut StdRng, total: f64, k: usize) -> Result<Vec<f64>> {
    let alphas: Vec<f64> = (0..k).map(|_| rng.gen_range(0.5..=1.5)).collect();
    split_with_concentrations(rng, total, &alphas)
}

/// Split with explicit concentration parameters
pub fn split_with_concentrations(
    rng: &mut StdRng,
    total: f64,
    alphas: &[f64],
) -> Result<Vec<f64>> {
    if alphas.len() < 2 {
        return Ok(vec![total]);
    }
    let dirichlet = Dirichlet::new(alphas)
        .map_err(|e| Error::SplitGeneration(format!("bad concentrations: {}", e)))?;
    let shares = dirichlet.sample(rng);

    let mut amounts: Vec<f64> = shares
        .iter()
        .map(|s| round_amount(total * s))
        .collect();

    // Last share absorbs rounding drift
    let head: f64 = amounts[..amounts.len() - 1].iter().sum();
    let last = amounts.len() - 1;
    amounts[last] = round_amount(total - head);

    Ok(amounts)
}

fn round_amount(v: f64) -> f64 {
    (v * AMOUNT_PRECISION).round() / AMOUNT_PRECISION
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_split_probability_scales_with_amount() {
        assert_eq!(split_probability(0.0, 1000.0), 0.0);
        assert_eq!(split_probability(500.0, 1000.0), 0.5);
        assert_eq!(split_probability(5000.0, 1000.0), 1.0);
    }

    #[test]
    fn test_shares_sum_exactly_to_total() {
        let mut rng = rng();
        for k in 2..=5 {
            for total in [1000.0, 333.333333, 0.07] {
                let amounts = split_amounts(&mut rng, total, k).unwrap();
                assert_eq!(amounts.len(), k);
                let sum: f64 = amounts.iter().sum();
                assert_eq!(round_amount(sum), round_amount(total));
            }
        }
    }

    #[test]
    fn test_three_way_split_of_1000() {
        // Concentrations [0.6, 0.9, 1.3]: uneven shares, exact total
        let mut rng = rng();
        let amounts = split_with_concentrations(&mut rng, 1000.0, &[0.6, 0.9, 1.3]).unwrap();
        assert_eq!(amounts.len(), 3);
        let sum: f64 = amounts.iter().sum();
        assert_eq!(round_amount(sum), 1000.0);
        for amount in &amounts {
            assert!(*amount > 0.0);
            assert!(*amount < 1000.0);
        }
    }

    #[test]
    fn test_shares_are_uneven() {
        let mut rng = rng();
        let amounts = split_amounts(&mut rng, 1000.0, 4).unwrap();
        let all_equal = amounts.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-9);
        assert!(!all_equal);
    }
}
