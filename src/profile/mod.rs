//! Trader profiles and the simulator that orchestrates execution
//!
//! Profiles are read-mostly reference data loaded once at startup; the
//! simulator composes the oracle, wallet registry and obfuscation engine
//! according to the active profile.

pub mod loader;
pub mod simulator;
pub mod types;
pub mod venues;

pub use loader::{builtin_profiles, load_profiles};
pub use simulator::{SimulatorStats, TraderProfileSimulator};
pub use types::{GasBehavior, RandomizationStrengths, SessionHabits, TraderProfile, TradingPattern};
pub use venues::{venue_countermeasures, VenueCountermeasures};
