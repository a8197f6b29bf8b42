//! Rolling-window pattern detector
//!
//! Watches recent (type, token) pairs; a long enough run of the same pair
//! raises a boost flag that stays up until the run is broken. The engine
//! feeds the flag back into its variance multipliers, so this is a closed
//! loop rather than a one-shot heuristic.

use std::collections::VecDeque;
use tracing::debug;

pub struct PatternDetector {
    window: VecDeque<String>,
    capacity: usize,
    max_consecutive: usize,
    boosted: bool,
}

impl PatternDetector {
    pub fn new(capacity: usize, max_consecutive: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            max_consecutive: max_consecutive.max(1),
            boosted: false,
        }
    }

    /// Record one intent key; returns whether boost is active afterwards
    pub fn record(&mut self, key: String) -> bool {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(key);

        let run = self.trailing_run();
        if run >= self.max_consecutive {
            if !self.boosted {
                debug!(run, "Repetition detected, raising variance");
            }
            self.boosted = true;
        } else if run == 1 {
            // A different key broke the run
            self.boosted = false;
        }
        self.boosted
    }

    pub fn is_boosted(&self) -> bool {
        self.boosted
    }

    /// Length of the identical run at the end of the window
    fn trailing_run(&self) -> usize {
        let Some(last) = self.window.back() else {
            return 0;
        };
        self.window.iter().rev().take_while(|k| *k == last).count()
    }
}
