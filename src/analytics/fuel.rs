//! Fuel consumption tracking and pit-stop projections.

/// Laps of consumption history the average runs over.
const CONSUMPTION_WINDOW: usize = 10;

/// Safety margin applied to refuel recommendations.
const SAFETY_MARGIN: f32 = 1.05;

/// Fallback consumption before any lap has been measured, liters per lap.
const DEFAULT_CONSUMPTION: f32 = 3.0;

/// Derived fuel figures for one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelStatus {
    pub current_l: f32,
    pub tank_l: f32,
    pub percent: f32,
    pub last_lap_consumption_l: f32,
    pub average_consumption_l: f32,
    pub estimated_laps: f32,
    pub is_low: bool,
    pub is_critical: bool,
}

/// Rolling fuel model for the player car.
#[derive(Debug)]
pub struct FuelCalculator {
    tank_l: f32,
    history: Vec<f32>,
    last_level_l: f32,
    initialized: bool,
}

impl FuelCalculator {
    pub fn new(tank_l: f32) -> Self {
        FuelCalculator { tank_l, history: Vec::new(), last_level_l: 0.0, initialized: false }
    }

    pub fn tank_l(&self) -> f32 {
        self.tank_l
    }

    /// Feeds the current fuel level; `lap_completed` closes a consumption
    /// measurement.
    pub fn update(&mut self, current_l: f32, lap_completed: bool) -> FuelStatus {
        if !self.initialized {
            self.last_level_l = current_l;
            self.initialized = true;
        }

        let mut last_lap_consumption = 0.0;
        if lap_completed && self.last_level_l > current_l {
            last_lap_consumption = self.last_level_l - current_l;
            self.history.push(last_lap_consumption);
            if self.history.len() > CONSUMPTION_WINDOW {
                self.history.remove(0);
            }
            self.last_level_l = current_l;
        }

        let average = self.average_consumption();
        let estimated_laps = if average > 0.0 { current_l / average } else { 0.0 };
        let percent =
            if self.tank_l > 0.0 { (current_l / self.tank_l) * 100.0 } else { 0.0 };

        FuelStatus {
            current_l,
            tank_l: self.tank_l,
            percent,
            last_lap_consumption_l: last_lap_consumption,
            average_consumption_l: average,
            estimated_laps,
            is_low: percent < 10.0,
            is_critical: percent < 5.0,
        }
    }

    /// Mean of the measured window; zero without measurements.
    pub fn average_consumption(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    fn working_consumption(&self) -> f32 {
        let average = self.average_consumption();
        if average > 0.0 { average } else { DEFAULT_CONSUMPTION }
    }

    /// Fuel needed for `laps`, with the safety margin, capped at tank
    /// size.
    pub fn fuel_for_laps(&self, laps: u32) -> f32 {
        (self.working_consumption() * laps as f32 * SAFETY_MARGIN).min(self.tank_l)
    }

    /// Laps possible on `fuel_l`.
    pub fn laps_with_fuel(&self, fuel_l: f32) -> f32 {
        fuel_l / self.working_consumption()
    }

    /// Whether the current level cannot cover the remaining laps plus a
    /// two-lap margin.
    pub fn should_refuel(&self, current_l: f32, laps_remaining: u32) -> bool {
        self.laps_with_fuel(current_l) < (laps_remaining + 2) as f32
    }

    /// Liters to add for the remaining laps, capped at tank headroom.
    pub fn refuel_amount(&self, current_l: f32, laps_remaining: u32) -> f32 {
        let needed = self.fuel_for_laps(laps_remaining) - current_l;
        needed.clamp(0.0, self.tank_l - current_l)
    }

    /// Positive when recent laps burn more than the earlier ones.
    pub fn consumption_trend(&self) -> f32 {
        let n = self.history.len();
        if n < 4 {
            return 0.0;
        }
        let recent = self.history[n - 3..].iter().sum::<f32>() / 3.0;
        let older = self.history[..n - 3].iter().sum::<f32>() / (n - 3) as f32;
        recent - older
    }

    /// Consumption is stable when its deviation stays under 10 % of the
    /// mean.
    pub fn is_stable(&self) -> bool {
        if self.history.len() < 3 {
            return false;
        }
        let mean = self.average_consumption();
        let variance = self
            .history
            .iter()
            .map(|c| (c - mean) * (c - mean))
            .sum::<f32>()
            / self.history.len() as f32;
        variance.sqrt() < mean * 0.1
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_level_l = 0.0;
        self.initialized = false;
    }
}
