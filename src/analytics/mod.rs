//! Derived physics analytics: fuel, tyres and driving inputs.
//!
//! The analytics layer consumes only the shared-memory feed. A 60 Hz
//! sampling task pushes each snapshot through the three processors; all
//! derived state is readable at any time through cloned snapshots.

pub mod driving;
pub mod fuel;
pub mod tyres;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::shmem::{SharedMemoryService, TelemetrySnapshot};
pub use driving::{DrivingProcessor, DrivingSample};
pub use fuel::{FuelCalculator, FuelStatus};
pub use tyres::{Compound, Corner, TempRegime, TyreMonitor, TyreState};

/// Sampling period of the analytics task, ~60 Hz.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(16);

/// Combined analytics state, updated by the sampling task.
struct AnalyticsState {
    fuel: FuelCalculator,
    tyres: TyreMonitor,
    driving: DrivingProcessor,
    last_fuel_status: Option<FuelStatus>,
    last_driving_sample: Option<DrivingSample>,
    last_completed_laps: i32,
}

impl AnalyticsState {
    fn new() -> Self {
        AnalyticsState {
            fuel: FuelCalculator::new(0.0),
            tyres: TyreMonitor::new(),
            driving: DrivingProcessor::new(),
            last_fuel_status: None,
            last_driving_sample: None,
            last_completed_laps: 0,
        }
    }

    fn ingest(&mut self, snapshot: &TelemetrySnapshot) {
        let physics = &snapshot.physics;
        let graphics = &snapshot.graphics;

        // Tank size comes from the static page; a new car resets the model.
        let tank = snapshot.static_data.max_fuel;
        if tank > 0.0 && self.fuel.tank_l() != tank {
            self.fuel = FuelCalculator::new(tank);
        }

        let lap_completed = graphics.completed_laps > self.last_completed_laps;
        self.last_completed_laps = graphics.completed_laps;
        self.last_fuel_status = Some(self.fuel.update(physics.fuel, lap_completed));

        self.tyres.set_compound(if graphics.rain_tyres == 1 {
            Compound::Wet
        } else {
            Compound::Dry
        });
        self.tyres.update(
            physics.wheel_pressure,
            physics.tyre_temp_inner,
            physics.tyre_temp_middle,
            physics.tyre_temp_outer,
            physics.tyre_core_temp,
            physics.tyre_wear,
            physics.brake_temp,
        );

        self.last_driving_sample = Some(self.driving.process(physics));
    }
}

/// Owns the analytics processors and their sampling task.
pub struct AnalyticsService {
    shmem: Arc<SharedMemoryService>,
    state: Arc<RwLock<AnalyticsState>>,
}

impl AnalyticsService {
    pub fn new(shmem: Arc<SharedMemoryService>) -> Self {
        AnalyticsService { shmem, state: Arc::new(RwLock::new(AnalyticsState::new())) }
    }

    /// Runs the 60 Hz sampling loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("analytics sampler started");
        let mut ticker = tokio::time::interval(SAMPLE_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("analytics sampler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if !self.shmem.ensure_mapped() {
                        continue;
                    }
                    match self.shmem.snapshot() {
                        Ok(snapshot) => self.ingest(&snapshot),
                        Err(e) => debug!(error = %e, "analytics sample skipped"),
                    }
                }
            }
        }
    }

    /// Feeds one snapshot; exposed for deterministic tests.
    pub fn ingest(&self, snapshot: &TelemetrySnapshot) {
        self.state.write().expect("analytics state poisoned").ingest(snapshot);
    }

    pub fn fuel_status(&self) -> Option<FuelStatus> {
        self.state.read().expect("analytics state poisoned").last_fuel_status
    }

    pub fn driving_sample(&self) -> Option<DrivingSample> {
        self.state.read().expect("analytics state poisoned").last_driving_sample
    }

    pub fn tyre_states(&self) -> [TyreState; 4] {
        self.state.read().expect("analytics state poisoned").tyres.all()
    }

    pub fn tyre_regime(&self, corner: Corner) -> TempRegime {
        self.state.read().expect("analytics state poisoned").tyres.regime(corner)
    }

    pub fn should_change_tyres(&self) -> bool {
        self.state.read().expect("analytics state poisoned").tyres.should_change()
    }

    pub fn reset(&self) {
        let mut state = self.state.write().expect("analytics state poisoned");
        *state = AnalyticsState::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shmem::{Graphics, Physics, StaticData};

    fn snapshot() -> TelemetrySnapshot {
        // Zeroed pages stand in for the simulator's startup state.
        let mut snap: TelemetrySnapshot = unsafe { std::mem::zeroed() };
        snap.static_data.max_fuel = 120.0;
        snap.physics.fuel = 60.0;
        snap
    }

    #[test]
    fn fuel_consumption_across_laps() {
        let service = AnalyticsService::new(Arc::new(SharedMemoryService::new()));

        let mut snap = snapshot();
        service.ingest(&snap);

        snap.physics.fuel = 57.0;
        snap.graphics.completed_laps = 1;
        service.ingest(&snap);

        let status = service.fuel_status().unwrap();
        assert!((status.last_lap_consumption_l - 3.0).abs() < 1e-4);
        assert_eq!(status.tank_l, 120.0);
    }

    #[test]
    fn rain_tyres_switch_the_compound_window() {
        let service = AnalyticsService::new(Arc::new(SharedMemoryService::new()));

        let mut snap = snapshot();
        snap.physics.tyre_temp_inner = [60.0; 4];
        snap.physics.tyre_temp_middle = [60.0; 4];
        snap.physics.tyre_temp_outer = [60.0; 4];
        service.ingest(&snap);
        assert_eq!(service.tyre_regime(Corner::FrontLeft), TempRegime::Underheating);

        snap.graphics.rain_tyres = 1;
        service.ingest(&snap);
        assert_eq!(service.tyre_regime(Corner::FrontLeft), TempRegime::Optimal);
    }

    #[test]
    fn driving_sample_is_published() {
        let service = AnalyticsService::new(Arc::new(SharedMemoryService::new()));
        let mut snap = snapshot();
        snap.physics.gas = 1.0;
        service.ingest(&snap);

        let sample = service.driving_sample().unwrap();
        assert!(sample.throttle > 0.0);
    }

    #[test]
    fn struct_sizes_allow_zeroed_test_pages() {
        // Guard for the zeroed() trick above.
        assert!(std::mem::size_of::<Physics>() > 0);
        assert!(std::mem::size_of::<Graphics>() > 0);
        assert!(std::mem::size_of::<StaticData>() > 0);
    }
}
