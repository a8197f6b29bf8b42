//! Delay generation with session-age and detector escalation

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Duration;

use crate::config::ObfuscationConfig;
use crate::profile::TradingPattern;

/// Variance multiplier for the current moment
///
/// Grows once the session runs past the escalation threshold and again
/// while the pattern detector is tripped. A long session with repetitive
/// intents gets visibly noisier timing.
pub fn variance_multiplier(
    config: &ObfuscationConfig,
    session_hours: f64,
    detector_boosted: bool,
) -> f64 {
    let mut multiplier = 1.0;
    if session_hours > config.session_escalation_after_hours {
        multiplier +=
            (session_hours - config.session_escalation_after_hours) * config.session_escalation_per_hour;
    }
    if detector_boosted {
        multiplier *= config.detector_variance_boost;
    }
    multiplier
}

/// Draw a jittered delay from the pattern's typical-delay set
pub fn draw_delay(
    rng: &mut StdRng,
    pattern: &TradingPattern,
    timing_strength: f64,
    multiplier: f64,
) -> Duration {
    let base = pattern
        .typical_delays_secs
        .choose(rng)
        .copied()
        .unwrap_or(1.0);

    let variance = (pattern.delay_jitter * timing_strength * multiplier).min(0.95);
    let factor = rng.gen_range((1.0 - variance)..=(1.0 + variance));
    Duration::from_secs_f64((base * factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::GasTier;
    use crate::profile::GasBehavior;

    fn test_pattern() -> TradingPattern {
        TradingPattern {
            name: "steady".into(),
            entry_split_ratios: vec![1.0],
            exit_split_ratios: vec![1.0],
            typical_delays_secs: vec![10.0],
            delay_jitter: 0.3,
            gas_tier: GasTier::Standard,
            gas_behavior: GasBehavior::Normal,
            slippage_bps: 100,
            tx_per_hour: 6.0,
        }
    }

    fn test_config() -> ObfuscationConfig {
        ObfuscationConfig::default()
    }

    #[test]
    fn test_no_escalation_inside_threshold() {
        let config = test_config();
        assert_eq!(variance_multiplier(&config, 1.0, false), 1.0);
    }

    #[test]
    fn test_session_age_escalates_variance() {
        let config = test_config();
        // Default: escalate 0.25 per hour past 2 hours
        let m = variance_multiplier(&config, 4.0, false);
        assert!((m - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_detector_boost_multiplies() {
        let config = test_config();
        let plain = variance_multiplier(&config, 4.0, false);
        let boosted = variance_multiplier(&config, 4.0, true);
        assert!(boosted > plain);
        assert!((boosted - plain * config.detector_variance_boost).abs() < 1e-9);
    }

    #[test]
    fn test_delay_spread_widens_with_multiplier() {
        let pattern = test_pattern();

        let spread = |multiplier: f64| -> f64 {
            let mut rng = StdRng::seed_from_u64(7);
            let delays: Vec<f64> = (0..500)
                .map(|_| draw_delay(&mut rng, &pattern, 1.0, multiplier).as_secs_f64())
                .collect();
            let min = delays.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = delays.iter().cloned().fold(0.0, f64::max);
            max - min
        };

        assert!(spread(2.0) > spread(1.0));
    }

    #[test]
    fn test_variance_is_capped_below_full_negation() {
        let pattern = test_pattern();
        let mut rng = StdRng::seed_from_u64(7);
        // Even with an absurd multiplier delays never go negative
        for _ in 0..200 {
            let d = draw_delay(&mut rng, &pattern, 1.0, 100.0);
            assert!(d.as_secs_f64() >= 0.0);
        }
    }
}
