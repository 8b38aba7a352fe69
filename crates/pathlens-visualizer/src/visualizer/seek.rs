//! Scrub seeking with cheap and deferred update tiers
//!
//! Every drag tick updates the current index immediately. The expensive work
//! (per-mode counts up to the index and re-rendering the visible prefix) runs
//! only after the drag pauses for the debounce delay, or on `commit`.

use super::timer::Debounce;
use pathlens_core::{ModeCounts, Segment};
use pathlens_settings::SeekSettings;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

/// Output of an expensive seek update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeekUpdate {
    /// Number of leading segments shown
    pub index: usize,
    /// Segment counts per mode among the shown segments
    pub counts: ModeCounts,
    pub epoch: u64,
}

#[derive(Debug, Clone)]
pub struct SeekController {
    /// `prefix[i]` counts the modes of `segments[..i]`
    prefix: Vec<ModeCounts>,
    current: usize,
    applied: Option<usize>,
    debounce: Debounce,
    epoch: u64,
    expensive_runs: u64,
}

impl SeekController {
    pub fn new(settings: &SeekSettings) -> Self {
        Self {
            prefix: vec![ModeCounts::new()],
            current: 0,
            applied: None,
            debounce: Debounce::new(settings.debounce()),
            epoch: 0,
            expensive_runs: 0,
        }
    }

    /// Start over for a new toolpath; the index is placed at the end.
    pub fn reset(&mut self, segments: &[Segment], epoch: u64) {
        let mut running = ModeCounts::new();
        self.prefix = Vec::with_capacity(segments.len() + 1);
        self.prefix.push(running);
        for segment in segments {
            running.increment(segment.mode);
            self.prefix.push(running);
        }
        self.current = segments.len();
        self.applied = None;
        self.debounce.cancel();
        self.epoch = epoch;
        self.expensive_runs = 0;
    }

    pub fn total(&self) -> usize {
        self.prefix.len() - 1
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Fraction of the toolpath currently selected.
    pub fn position(&self) -> f64 {
        match self.total() {
            0 => 1.0,
            total => self.current as f64 / total as f64,
        }
    }

    pub fn applied_index(&self) -> Option<usize> {
        self.applied
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn expensive_runs(&self) -> u64 {
        self.expensive_runs
    }

    /// Counts of each mode among the first `index` segments, clamped.
    pub fn counts_at(&self, index: usize) -> ModeCounts {
        self.prefix[index.min(self.total())]
    }

    /// Cheap tier: map a slider position in `[0, 1]` to an index and defer
    /// the expensive update.
    pub fn seek(&mut self, position: f64, now: Instant) -> usize {
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, 1.0)
        };
        let index = (position * self.total() as f64).round() as usize;
        self.seek_index(index, now)
    }

    pub fn seek_index(&mut self, index: usize, now: Instant) -> usize {
        self.current = index.min(self.total());
        self.debounce.schedule(now, self.epoch);
        self.current
    }

    /// Run the expensive tier if its timer fired under the current epoch.
    pub fn poll(&mut self, now: Instant, current_epoch: u64) -> Option<SeekUpdate> {
        if self.debounce.poll(now, current_epoch) {
            Some(self.run_expensive())
        } else {
            None
        }
    }

    /// Drag released: run the expensive tier now for the final index.
    pub fn commit(&mut self) -> SeekUpdate {
        self.debounce.cancel();
        self.run_expensive()
    }

    fn run_expensive(&mut self) -> SeekUpdate {
        self.expensive_runs += 1;
        self.applied = Some(self.current);
        debug!(
            "Seek applied at {}/{} ({})",
            self.current,
            self.total(),
            self.prefix[self.current]
        );
        SeekUpdate {
            index: self.current,
            counts: self.prefix[self.current],
            epoch: self.epoch,
        }
    }
}
