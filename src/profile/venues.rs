//! Static table of per-venue countermeasures
//!
//! Some venues run stricter automation detection than others; the table
//! adds a venue-specific delay band, a small extra gas jitter, and
//! optionally salts transaction metadata so repeated payloads do not hash
//! identically.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Adjustments layered on top of an execution plan for a given venue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VenueCountermeasures {
    /// Extra delay added to the first planned transaction, seconds
    pub extra_delay_secs: (f64, f64),
    /// Additional gas multiplier jitter, as a fraction (0.02 = +/-2%)
    pub gas_jitter_pct: f64,
    /// Whether to inject a random metadata salt into the calldata
    pub salt_metadata: bool,
}

const DEFAULT_COUNTERMEASURES: VenueCountermeasures = VenueCountermeasures {
    extra_delay_secs: (0.0, 2.0),
    gas_jitter_pct: 0.01,
    salt_metadata: false,
};

lazy_static! {
    static ref VENUE_TABLE: HashMap<&'static str, VenueCountermeasures> = {
        let mut table = HashMap::new();
        table.insert(
            "uniswap_v2",
            VenueCountermeasures {
                extra_delay_secs: (1.0, 5.0),
                gas_jitter_pct: 0.02,
                salt_metadata: false,
            },
        );
        table.insert(
            "uniswap_v3",
            VenueCountermeasures {
                extra_delay_secs: (1.0, 4.0),
                gas_jitter_pct: 0.02,
                salt_metadata: true,
            },
        );
        table.insert(
            "sushiswap",
            VenueCountermeasures {
                extra_delay_secs: (0.5, 3.0),
                gas_jitter_pct: 0.015,
                salt_metadata: false,
            },
        );
        table.insert(
            "pancakeswap",
            VenueCountermeasures {
                extra_delay_secs: (2.0, 8.0),
                gas_jitter_pct: 0.03,
                salt_metadata: true,
            },
        );
        table.insert(
            "curve",
            VenueCountermeasures {
                extra_delay_secs: (0.0, 2.0),
                gas_jitter_pct: 0.01,
                salt_metadata: false,
            },
        );
        table
    };
}

/// Look up countermeasures for a venue; unknown venues get a mild default.
pub fn venue_countermeasures(venue: &str) -> VenueCountermeasures {
    VENUE_TABLE
        .get(venue.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_COUNTERMEASURES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_venue_lookup() {
        let cm = venue_countermeasures("uniswap_v3");
        assert!(cm.salt_metadata);
        assert_eq!(cm.gas_jitter_pct, 0.02);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(
            venue_countermeasures("SushiSwap"),
            venue_countermeasures("sushiswap")
        );
    }

    #[test]
    fn test_unknown_venue_gets_default() {
        let cm = venue_countermeasures("some_new_dex");
        assert_eq!(cm, DEFAULT_COUNTERMEASURES);
    }
}
