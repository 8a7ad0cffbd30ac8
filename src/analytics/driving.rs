//! Driving-input analysis from the physics page.
//!
//! Raw pedal traces carry sampling noise, so throttle and brake go
//! through exponential smoothing before any heuristic looks at them.

use crate::shmem::layout::Physics;

/// Exponential smoothing factor for pedal inputs.
const SMOOTHING: f32 = 0.2;

/// Slip ratio below which a wheel counts as locked under braking.
const LOCK_SLIP_RATIO: f32 = -0.1;

/// Assumed steering lock for the lock-percent figure, degrees per side.
const MAX_STEERING_DEG: f32 = 270.0;

/// Digested driving sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrivingSample {
    pub throttle: f32,
    pub brake: f32,
    pub clutch: f32,
    pub steering_rad: f32,
    pub steering_deg: f32,
    pub steering_lock_pct: f32,
    pub gear: i32,
    pub rpm: i32,
    pub max_rpm: i32,
    pub rpm_pct: f32,
    pub speed_kmh: f32,
    pub g_lateral: f32,
    pub g_longitudinal: f32,
    pub g_vertical: f32,
    pub g_total: f32,
    pub wheel_slip: [f32; 4],
    pub wheel_locked: [bool; 4],
    pub any_wheel_locked: bool,
    pub tc_active: bool,
    pub abs_active: bool,
    pub pit_limiter: bool,
    pub engine_running: bool,
}

impl DrivingSample {
    pub fn is_full_throttle(&self) -> bool {
        self.throttle > 0.95
    }

    pub fn is_braking(&self) -> bool {
        self.brake > 0.1
    }

    pub fn is_coasting(&self) -> bool {
        self.throttle < 0.05 && self.brake < 0.05
    }

    pub fn is_trail_braking(&self) -> bool {
        self.brake > 0.1 && self.throttle > 0.1
    }

    pub fn is_cornering(&self) -> bool {
        self.steering_deg.abs() > 5.0
    }

    pub fn cornering_force(&self) -> f32 {
        self.g_lateral.abs()
    }

    pub fn mean_wheel_slip(&self) -> f32 {
        self.wheel_slip.iter().map(|s| s.abs()).sum::<f32>() / 4.0
    }

    pub fn has_traction_issue(&self) -> bool {
        self.mean_wheel_slip() > 0.3
    }

    /// Lots of steering input with little lateral response.
    pub fn is_understeering(&self) -> bool {
        self.steering_deg.abs() > 30.0 && self.cornering_force() < 1.0
    }

    /// High lateral load with the rear axle sliding.
    pub fn is_oversteering(&self) -> bool {
        let rear_slip = (self.wheel_slip[2] + self.wheel_slip[3]) / 2.0;
        self.cornering_force() > 1.5 && rear_slip > 0.4
    }

    pub fn should_upshift(&self) -> bool {
        self.rpm_pct > 95.0 && self.throttle > 0.9
    }

    pub fn should_downshift(&self) -> bool {
        self.rpm_pct < 40.0 && self.gear > 1
    }

    pub fn style(&self) -> &'static str {
        if self.is_full_throttle() && !self.is_cornering() {
            "Straight Line"
        } else if self.is_trail_braking() {
            "Trail Braking"
        } else if self.is_braking() && self.is_cornering() {
            "Braking in Corner"
        } else if self.is_cornering() && self.throttle > 0.5 {
            "Accelerating in Corner"
        } else if self.is_coasting() {
            "Coasting"
        } else {
            "Normal"
        }
    }
}

/// Stateful input smoother and sample builder.
#[derive(Debug, Default)]
pub struct DrivingProcessor {
    throttle_smoothed: f32,
    brake_smoothed: f32,
    last_throttle: f32,
    last_brake: f32,
}

impl DrivingProcessor {
    pub fn new() -> Self {
        DrivingProcessor::default()
    }

    /// Digests one physics sample.
    pub fn process(&mut self, physics: &Physics) -> DrivingSample {
        self.last_throttle = self.throttle_smoothed;
        self.last_brake = self.brake_smoothed;
        self.throttle_smoothed = smooth(self.throttle_smoothed, physics.gas);
        self.brake_smoothed = smooth(self.brake_smoothed, physics.brake);

        let steering_deg = physics.steer_angle.to_degrees();
        let steering_lock_pct = (steering_deg.abs() / MAX_STEERING_DEG * 100.0).min(100.0);

        let wheel_locked = physics.slip_ratio.map(|slip| slip < LOCK_SLIP_RATIO);
        let g = physics.acc_g;

        let rpm_pct = if physics.current_max_rpm > 0 {
            physics.rpm as f32 / physics.current_max_rpm as f32 * 100.0
        } else {
            0.0
        };

        DrivingSample {
            throttle: self.throttle_smoothed,
            brake: self.brake_smoothed,
            clutch: physics.clutch,
            steering_rad: physics.steer_angle,
            steering_deg,
            steering_lock_pct,
            gear: physics.gear,
            rpm: physics.rpm,
            max_rpm: physics.current_max_rpm,
            rpm_pct,
            speed_kmh: physics.speed_kmh,
            g_lateral: g[0],
            g_longitudinal: g[1],
            g_vertical: g[2],
            g_total: (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt(),
            wheel_slip: physics.wheel_slip,
            wheel_locked,
            any_wheel_locked: wheel_locked.iter().any(|&locked| locked),
            tc_active: physics.tc_in_action == 1,
            abs_active: physics.abs_in_action == 1,
            pit_limiter: physics.pit_limiter_on == 1,
            engine_running: physics.is_engine_running == 1,
        }
    }

    /// Input smoothness score in [0, 100]; larger is smoother.
    pub fn smoothness(&self) -> f32 {
        let throttle_diff = (self.throttle_smoothed - self.last_throttle).abs();
        let brake_diff = (self.brake_smoothed - self.last_brake).abs();
        ((1.0 - (throttle_diff + brake_diff) / 2.0) * 100.0).clamp(0.0, 100.0)
    }

    pub fn reset(&mut self) {
        *self = DrivingProcessor::default();
    }
}

fn smooth(current: f32, target: f32) -> f32 {
    current + (target - current) * SMOOTHING
}
