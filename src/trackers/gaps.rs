//! Checkpoint-based time gaps.
//!
//! The track spline is divided into evenly spaced checkpoints, one per
//! 50 m. Every car stamps a checkpoint when its spline position passes
//! over it; the difference between two cars' stamps at the same checkpoint
//! is exactly the time gap through that point, since a car crosses each
//! checkpoint once per lap.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Distance between checkpoints along the spline.
pub const CHECKPOINT_SPACING_M: f32 = 50.0;

/// A pass time younger than this is sticky and will not be overwritten.
/// Prevents stationary cars from flapping a checkpoint's stamp.
const PASS_STICKINESS: Duration = Duration::from_secs(60);

/// Per-car rings of checkpoint pass times.
#[derive(Debug, Default)]
pub struct GapTracker {
    checkpoints: usize,
    passes: HashMap<u16, Vec<Option<Instant>>>,
}

impl GapTracker {
    pub fn new() -> Self {
        GapTracker::default()
    }

    /// Sizes the checkpoint grid for a track; resets all pass data.
    pub fn initialize(&mut self, track_meters: f32) {
        self.checkpoints = (track_meters / CHECKPOINT_SPACING_M).floor() as usize;
        self.passes.clear();
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints
    }

    /// Records a car's position, stamping any checkpoint it is currently
    /// passing over.
    pub fn record(&mut self, car_index: u16, spline: f32) {
        self.record_at(car_index, spline, Instant::now());
    }

    /// [`GapTracker::record`] with an explicit clock, for determinism.
    pub fn record_at(&mut self, car_index: u16, spline: f32, now: Instant) {
        let n = self.checkpoints;
        if n == 0 {
            return;
        }

        let slots = self.passes.entry(car_index).or_insert_with(|| vec![None; n]);
        let step = 1.0 / n as f32;

        for (i, slot) in slots.iter_mut().enumerate() {
            let centre = i as f32 * step;
            if spline > centre && spline < centre + step * 1.5 {
                let stale = slot.map_or(true, |at| {
                    now.checked_duration_since(at).map_or(false, |age| age > PASS_STICKINESS)
                });
                if stale {
                    *slot = Some(now);
                }
            }
        }
    }

    /// Time gap between two cars, measured at the checkpoint under the
    /// trailing car's spline position.
    ///
    /// Falls back to the previous checkpoint (wrapping) once before giving
    /// up with `None`.
    pub fn time_gap(&self, ahead: u16, behind: u16, spline_behind: f32) -> Option<Duration> {
        let n = self.checkpoints;
        if n == 0 {
            return None;
        }

        let ahead_slots = self.passes.get(&ahead)?;
        let behind_slots = self.passes.get(&behind)?;

        let index = ((spline_behind * n as f32) as usize).min(n - 1);

        self.gap_at(ahead_slots, behind_slots, index)
            .or_else(|| self.gap_at(ahead_slots, behind_slots, (index + n - 1) % n))
    }

    fn gap_at(
        &self,
        ahead: &[Option<Instant>],
        behind: &[Option<Instant>],
        index: usize,
    ) -> Option<Duration> {
        let passed_ahead = ahead.get(index).copied().flatten()?;
        let passed_behind = behind.get(index).copied().flatten()?;
        passed_behind.checked_duration_since(passed_ahead)
    }

    /// Drops all pass data, keeping the checkpoint grid.
    pub fn clear(&mut self) {
        self.passes.clear();
    }

    /// Drops everything including the grid.
    pub fn reset(&mut self) {
        self.clear();
        self.checkpoints = 0;
    }
}
