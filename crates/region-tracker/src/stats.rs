// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Registry statistics for profiling and diagnostics.
//!
//! [`TrackerStats`] tracks cumulative counts of registry transitions:
//! declarations, destructions, moves and invalidation cascades, plus the
//! live and peak tracked-region counts.

/// Cumulative statistics about the region registry.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TrackerStats {
    /// Total number of view declarations.
    pub declares: u64,
    /// Total number of view destructions (including silent no-ops).
    pub destroys: u64,
    /// Total number of region moves (reallocations/truncations).
    pub moves: u64,
    /// Total number of intervals removed by invalidation cascades.
    pub invalidations: u64,
    /// Number of intervals currently tracked.
    pub live_regions: usize,
    /// High-water mark of tracked intervals.
    pub peak_regions: usize,
}

impl TrackerStats {
    pub(crate) fn record_declare(&mut self) {
        self.declares += 1;
    }

    pub(crate) fn record_destroy(&mut self) {
        self.destroys += 1;
    }

    pub(crate) fn record_move(&mut self) {
        self.moves += 1;
    }

    pub(crate) fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }

    /// Updates the live count and the high-water mark.
    pub(crate) fn update_live(&mut self, live: usize) {
        self.live_regions = live;
        if live > self.peak_regions {
            self.peak_regions = live;
        }
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Regions: {} live (peak {}), {} declares, {} destroys, {} moves, {} invalidations",
            self.live_regions,
            self.peak_regions,
            self.declares,
            self.destroys,
            self.moves,
            self.invalidations,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let s = TrackerStats::default();
        assert_eq!(s.declares, 0);
        assert_eq!(s.live_regions, 0);
    }

    #[test]
    fn test_peak_tracking() {
        let mut s = TrackerStats::default();
        s.update_live(3);
        s.update_live(1);
        assert_eq!(s.live_regions, 1);
        assert_eq!(s.peak_regions, 3);
        s.update_live(5);
        assert_eq!(s.peak_regions, 5);
    }

    #[test]
    fn test_summary() {
        let mut s = TrackerStats::default();
        s.record_declare();
        s.record_declare();
        s.record_move();
        s.update_live(2);
        let summary = s.summary();
        assert!(summary.contains("2 live"));
        assert!(summary.contains("2 declares"));
        assert!(summary.contains("1 moves"));
    }

    #[test]
    fn test_serialize() {
        let mut s = TrackerStats::default();
        s.record_declare();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"declares\":1"));
    }
}
