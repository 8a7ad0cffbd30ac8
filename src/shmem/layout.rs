//! Fixed byte layouts of the simulator's shared-memory regions.
//!
//! Region names and field order are dictated by the simulator and are not
//! negotiable; the structs below mirror its C layout exactly via
//! `#[repr(C)]`. All string fields are UTF-16, null-terminated within
//! fixed arrays.

/// Physics region name.
pub const PHYSICS_REGION: &str = r"Local\acpmf_physics";
/// Graphics region name.
pub const GRAPHICS_REGION: &str = r"Local\acpmf_graphics";
/// Static-data region name.
pub const STATIC_REGION: &str = r"Local\acpmf_static";

/// Game lifecycle as reported in the graphics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    Off,
    Replay,
    Live,
    Pause,
}

impl GameStatus {
    /// Unknown raw values (torn reads, future versions) degrade to `Off`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => GameStatus::Replay,
            2 => GameStatus::Live,
            3 => GameStatus::Pause,
            _ => GameStatus::Off,
        }
    }
}

/// Session type as reported in the graphics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimSession {
    #[default]
    Unknown,
    Practice,
    Qualify,
    Race,
    Hotlap,
    TimeAttack,
    Drift,
    Drag,
}

impl SimSession {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => SimSession::Practice,
            1 => SimSession::Qualify,
            2 => SimSession::Race,
            3 => SimSession::Hotlap,
            4 => SimSession::TimeAttack,
            5 => SimSession::Drift,
            6 => SimSession::Drag,
            _ => SimSession::Unknown,
        }
    }
}

/// Race-control flag shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackFlag {
    #[default]
    None,
    Blue,
    Yellow,
    Black,
    White,
    Checkered,
    Penalty,
}

impl TrackFlag {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => TrackFlag::Blue,
            2 => TrackFlag::Yellow,
            3 => TrackFlag::Black,
            4 => TrackFlag::White,
            5 => TrackFlag::Checkered,
            6 => TrackFlag::Penalty,
            _ => TrackFlag::None,
        }
    }
}

/// Decode a null-terminated UTF-16 buffer.
pub fn utf16_string(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

/// Physics page, written by the simulator at physics rate.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Physics {
    pub packet_id: i32,
    pub gas: f32,
    pub brake: f32,
    pub fuel: f32,
    pub gear: i32,
    pub rpm: i32,
    pub steer_angle: f32,
    pub speed_kmh: f32,
    pub velocity: [f32; 3],
    pub acc_g: [f32; 3],
    pub wheel_slip: [f32; 4],
    pub wheel_load: [f32; 4],
    pub wheel_pressure: [f32; 4],
    pub wheel_angular_speed: [f32; 4],
    pub tyre_wear: [f32; 4],
    pub tyre_dirty_level: [f32; 4],
    pub tyre_core_temp: [f32; 4],
    pub camber_rad: [f32; 4],
    pub suspension_travel: [f32; 4],
    pub drs: f32,
    pub tc: f32,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub cg_height: f32,
    pub car_damage: [f32; 5],
    pub number_of_tyres_out: i32,
    pub pit_limiter_on: i32,
    pub abs: f32,
    pub kers_charge: f32,
    pub kers_input: f32,
    pub auto_shifter_on: i32,
    pub ride_height: [f32; 2],
    pub turbo_boost: f32,
    pub ballast: f32,
    pub air_density: f32,
    pub air_temp: f32,
    pub road_temp: f32,
    pub local_angular_vel: [f32; 3],
    pub final_ff: f32,
    pub performance_meter: f32,
    pub engine_brake: i32,
    pub ers_recovery_level: i32,
    pub ers_power_level: i32,
    pub ers_heat_charging: i32,
    pub ers_is_charging: i32,
    pub kers_current_kj: f32,
    pub drs_available: i32,
    pub drs_enabled: i32,
    pub brake_temp: [f32; 4],
    pub clutch: f32,
    pub tyre_temp_inner: [f32; 4],
    pub tyre_temp_middle: [f32; 4],
    pub tyre_temp_outer: [f32; 4],
    pub is_ai_controlled: i32,
    pub tyre_contact_point: [[f32; 3]; 4],
    pub tyre_contact_normal: [[f32; 3]; 4],
    pub tyre_contact_heading: [[f32; 3]; 4],
    pub brake_bias: f32,
    pub local_velocity: [f32; 3],
    pub p2p_activations: i32,
    pub p2p_status: i32,
    pub current_max_rpm: i32,
    pub mz: [f32; 4],
    pub fx: [f32; 4],
    pub fy: [f32; 4],
    pub slip_ratio: [f32; 4],
    pub slip_angle: [f32; 4],
    pub tc_in_action: i32,
    pub abs_in_action: i32,
    pub suspension_damage: [f32; 4],
    pub tyre_temp: [f32; 4],
    pub water_temp: f32,
    pub brake_pressure: [f32; 4],
    pub front_brake_compound: i32,
    pub rear_brake_compound: i32,
    pub pad_life: [f32; 4],
    pub disc_life: [f32; 4],
    pub ignition_on: i32,
    pub starter_engine_on: i32,
    pub is_engine_running: i32,
    pub kerb_vibration: f32,
    pub slip_vibrations: f32,
    pub g_vibrations: f32,
    pub abs_vibrations: f32,
}

/// Graphics page, written by the simulator at render rate.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Graphics {
    pub packet_id: i32,
    pub status: i32,
    pub session: i32,
    pub current_time: [u16; 15],
    pub last_time: [u16; 15],
    pub best_time: [u16; 15],
    pub split: [u16; 15],
    pub completed_laps: i32,
    pub position: i32,
    pub i_current_time: i32,
    pub i_last_time: i32,
    pub i_best_time: i32,
    pub session_time_left: f32,
    pub distance_traveled: f32,
    pub is_in_pit: i32,
    pub current_sector_index: i32,
    pub last_sector_time: i32,
    pub number_of_laps: i32,
    pub tyre_compound: [u16; 33],
    pub replay_time_multiplier: f32,
    pub normalized_car_position: f32,
    pub active_cars: i32,
    pub car_coordinates: [[f32; 3]; 60],
    pub car_id: [i32; 60],
    pub player_car_id: i32,
    pub penalty_time: f32,
    pub flag: i32,
    pub penalty_shortcut: i32,
    pub ideal_line_on: i32,
    pub is_in_pit_lane: i32,
    pub surface_grip: f32,
    pub mandatory_pit_done: i32,
    pub wind_speed: f32,
    pub wind_direction: f32,
    pub is_setup_menu_visible: i32,
    pub main_display_index: i32,
    pub secondary_display_index: i32,
    pub tc: i32,
    pub tc_cut: i32,
    pub engine_map: i32,
    pub abs: i32,
    pub fuel_per_lap: f32,
    pub rain_lights: i32,
    pub flashing_lights: i32,
    pub lights_stage: i32,
    pub exhaust_temperature: f32,
    pub wiper_lv: i32,
    pub driver_stint_total_time_left: i32,
    pub driver_stint_time_left: i32,
    pub rain_tyres: i32,
    pub session_index: i32,
    pub used_fuel: f32,
    pub delta_lap_time: [u16; 15],
    pub i_delta_lap_time: i32,
    pub estimated_lap_time: [u16; 15],
    pub i_estimated_lap_time: i32,
    pub is_delta_positive: i32,
    pub i_split: i32,
    pub is_valid_lap: i32,
    pub fuel_estimated_laps: f32,
    pub track_status: [u16; 33],
    pub missing_mandatory_pits: i32,
    pub clock: f32,
    pub direction_lights_left: i32,
    pub direction_lights_right: i32,
    pub global_yellow: i32,
    pub global_yellow_1: i32,
    pub global_yellow_2: i32,
    pub global_yellow_3: i32,
    pub global_white: i32,
    pub global_green: i32,
    pub global_chequered: i32,
    pub global_red: i32,
    pub mfd_tyre_set: i32,
    pub mfd_fuel_to_add: f32,
    pub mfd_tyre_pressure_lf: f32,
    pub mfd_tyre_pressure_rf: f32,
    pub mfd_tyre_pressure_lr: f32,
    pub mfd_tyre_pressure_rr: f32,
    pub track_grip_status: i32,
    pub rain_intensity: i32,
    pub rain_intensity_in_10min: i32,
    pub rain_intensity_in_30min: i32,
    pub current_tyre_set: i32,
    pub strategy_tyre_set: i32,
}

impl Graphics {
    pub fn status(&self) -> GameStatus {
        GameStatus::from_raw(self.status)
    }

    pub fn session(&self) -> SimSession {
        SimSession::from_raw(self.session)
    }

    pub fn flag(&self) -> TrackFlag {
        TrackFlag::from_raw(self.flag)
    }

    pub fn tyre_compound(&self) -> String {
        utf16_string(&self.tyre_compound)
    }

    pub fn track_status(&self) -> String {
        utf16_string(&self.track_status)
    }
}

/// Static page, written once per session.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StaticData {
    pub sm_version: [u16; 15],
    pub ac_version: [u16; 15],
    pub number_of_sessions: i32,
    pub num_cars: i32,
    pub car_model: [u16; 33],
    pub track: [u16; 33],
    pub player_name: [u16; 33],
    pub player_surname: [u16; 33],
    pub player_nick: [u16; 33],
    pub sector_count: i32,
    pub max_torque: f32,
    pub max_power: f32,
    pub max_rpm: i32,
    pub max_fuel: f32,
    pub suspension_max_travel: [f32; 4],
    pub tyre_radius: [f32; 4],
    pub max_turbo_boost: f32,
    pub deprecated_1: f32,
    pub deprecated_2: f32,
    pub penalties_enabled: i32,
    pub aid_fuel_rate: f32,
    pub aid_tyre_rate: f32,
    pub aid_mechanical_damage: f32,
    pub aid_allow_tyre_blankets: i32,
    pub aid_stability: f32,
    pub aid_auto_clutch: i32,
    pub aid_auto_blip: i32,
    pub has_drs: i32,
    pub has_ers: i32,
    pub has_kers: i32,
    pub kers_max_j: f32,
    pub engine_brake_settings_count: i32,
    pub ers_power_controller_count: i32,
    pub track_spline_length: f32,
    pub track_configuration: [u16; 33],
    pub ers_max_j: f32,
    pub is_timed_race: i32,
    pub has_extra_lap: i32,
    pub car_skin: [u16; 33],
    pub reversed_grid_positions: i32,
    pub pit_window_start: i32,
    pub pit_window_end: i32,
    pub is_online: i32,
    pub dry_tyres_name: [u16; 33],
    pub wet_tyres_name: [u16; 33],
}

impl StaticData {
    pub fn car_model(&self) -> String {
        utf16_string(&self.car_model)
    }

    pub fn track(&self) -> String {
        utf16_string(&self.track)
    }

    pub fn player_name(&self) -> String {
        utf16_string(&self.player_name)
    }

    pub fn player_surname(&self) -> String {
        utf16_string(&self.player_surname)
    }

    pub fn player_nick(&self) -> String {
        utf16_string(&self.player_nick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_status_raw_values() {
        assert_eq!(GameStatus::from_raw(0), GameStatus::Off);
        assert_eq!(GameStatus::from_raw(1), GameStatus::Replay);
        assert_eq!(GameStatus::from_raw(2), GameStatus::Live);
        assert_eq!(GameStatus::from_raw(3), GameStatus::Pause);
        assert_eq!(GameStatus::from_raw(-7), GameStatus::Off);
    }

    #[test]
    fn utf16_stops_at_null() {
        let mut buf = [0u16; 8];
        for (i, c) in "GT3".encode_utf16().enumerate() {
            buf[i] = c;
        }
        assert_eq!(utf16_string(&buf), "GT3");
        assert_eq!(utf16_string(&[0u16; 4]), "");
    }

    #[test]
    fn region_sizes_are_plausible() {
        // The simulator's pages are roughly 0.7 KiB / 1.5 KiB / 0.8 KiB.
        assert!(std::mem::size_of::<Physics>() > 600);
        assert!(std::mem::size_of::<Physics>() < 800);
        assert!(std::mem::size_of::<Graphics>() > 1200);
        assert!(std::mem::size_of::<Graphics>() < 1800);
        assert!(std::mem::size_of::<StaticData>() > 700);
        assert!(std::mem::size_of::<StaticData>() < 900);
    }

    #[test]
    fn packet_id_is_first_field() {
        // The torn-read guard depends on packet_id sitting at offset 0.
        assert_eq!(std::mem::offset_of!(Physics, packet_id), 0);
        assert_eq!(std::mem::offset_of!(Graphics, packet_id), 0);
    }
}
