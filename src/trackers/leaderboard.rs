//! Leaderboard with computed gaps and intervals.
//!
//! Rows are projected from the merged entry list, ordered by official
//! position. Gaps are estimated from lap count plus spline distance scaled
//! by the leader's best lap; that keeps the math stable even before the
//! checkpoint grid has data for every car.

use crate::protocol::enums::{CarLocation, CupCategory, SessionKind};
use crate::trackers::entry_list::CarRecord;

/// Interval under which two consecutive cars count as battling, seconds.
pub const BATTLE_THRESHOLD_S: f32 = 2.0;

/// One ranked car.
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub position: u16,
    pub car_index: u16,
    pub race_number: i32,
    pub driver_name: String,
    pub team_name: String,
    pub car_model: u8,
    pub best_lap_ms: i32,
    pub last_lap_ms: i32,
    pub laps: u16,
    pub spline_position: f32,
    /// "Leader" for the first row, "+1 Lap" / "+12.345" otherwise.
    pub gap: String,
    pub interval: String,
    pub gap_ms: i32,
    pub interval_ms: i32,
    pub is_player: bool,
    pub in_pit: bool,
    pub cup_position: u16,
    pub cup_category: CupCategory,
    pub location: CarLocation,
    pub speed_kmh: u16,
}

/// Ordered standings, refreshed from tracker snapshots.
#[derive(Debug, Default)]
pub struct Leaderboard {
    rows: Vec<LeaderboardRow>,
    session_kind: Option<SessionKind>,
    player_car: u16,
    leader_best_ms: i32,
}

impl Leaderboard {
    pub fn new() -> Self {
        Leaderboard::default()
    }

    /// Rebuilds the standings from the current entry list.
    pub fn refresh(&mut self, cars: &[CarRecord], session_kind: SessionKind, player_car: u16) {
        self.session_kind = Some(session_kind);
        self.player_car = player_car;

        self.rows = cars
            .iter()
            .filter_map(|record| {
                let entry = record.entry.as_ref()?;
                let sample = record.sample.as_ref()?;
                Some(LeaderboardRow {
                    position: sample.position,
                    car_index: record.index,
                    race_number: entry.race_number,
                    driver_name: entry.current_driver_name(),
                    team_name: entry.team_name.clone(),
                    car_model: entry.model,
                    best_lap_ms: sample.best_session_lap.computed_time_ms(),
                    last_lap_ms: sample.last_lap.computed_time_ms(),
                    laps: sample.laps,
                    spline_position: sample.spline_position,
                    gap: String::new(),
                    interval: String::new(),
                    gap_ms: 0,
                    interval_ms: 0,
                    is_player: record.index == player_car,
                    in_pit: sample.location == CarLocation::Pitlane,
                    cup_position: sample.cup_position,
                    cup_category: entry.cup_category,
                    location: sample.location,
                    speed_kmh: sample.speed_kmh,
                })
            })
            .collect();

        self.rows.sort_by_key(|row| row.position);
        self.compute_gaps();
    }

    fn compute_gaps(&mut self) {
        if self.rows.is_empty() {
            return;
        }

        // The leader's best lap scales spline distance to time. When the
        // leader has no lap yet, the previous value keeps working.
        if self.rows[0].best_lap_ms > 0 {
            self.leader_best_ms = self.rows[0].best_lap_ms;
        }
        let reference_ms = self.leader_best_ms;

        self.rows[0].gap = "Leader".into();
        self.rows[0].interval = "---".into();
        self.rows[0].gap_ms = 0;
        self.rows[0].interval_ms = 0;

        for i in 1..self.rows.len() {
            let leader = (self.rows[0].laps, self.rows[0].spline_position);
            let ahead = (self.rows[i - 1].laps, self.rows[i - 1].spline_position);
            let row = &self.rows[i];

            let (gap_ms, gap) =
                gap_to(leader, (row.laps, row.spline_position), reference_ms, true);
            let (interval_ms, interval) =
                gap_to(ahead, (row.laps, row.spline_position), reference_ms, false);

            let row = &mut self.rows[i];
            row.gap_ms = gap_ms;
            row.gap = gap;
            row.interval_ms = interval_ms;
            row.interval = interval;
        }
    }

    pub fn rows(&self) -> &[LeaderboardRow] {
        &self.rows
    }

    /// Session kind of the last refresh.
    pub fn session_kind(&self) -> Option<SessionKind> {
        self.session_kind
    }

    pub fn player_car(&self) -> u16 {
        self.player_car
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn leader(&self) -> Option<&LeaderboardRow> {
        self.rows.first()
    }

    pub fn top_n(&self, n: usize) -> &[LeaderboardRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn row_for_car(&self, car_index: u16) -> Option<&LeaderboardRow> {
        self.rows.iter().find(|row| row.car_index == car_index)
    }

    pub fn player_row(&self) -> Option<&LeaderboardRow> {
        self.rows.iter().find(|row| row.is_player)
    }

    /// Rows around the player, `range` positions either side.
    pub fn relative(&self, range: usize) -> &[LeaderboardRow] {
        let Some(player_idx) = self.rows.iter().position(|row| row.is_player) else {
            return &self.rows;
        };
        let start = player_idx.saturating_sub(range);
        let end = (player_idx + range + 1).min(self.rows.len());
        &self.rows[start..end]
    }

    /// Cars of one cup class, renumbered 1..n within the class.
    pub fn by_class(&self, category: CupCategory) -> Vec<LeaderboardRow> {
        let mut filtered: Vec<LeaderboardRow> =
            self.rows.iter().filter(|row| row.cup_category == category).cloned().collect();
        for (i, row) in filtered.iter_mut().enumerate() {
            row.cup_position = i as u16 + 1;
        }
        filtered
    }

    /// Whether the car holding `position` is within `threshold_s` of the
    /// car ahead.
    pub fn battle_for(&self, position: usize, threshold_s: f32) -> bool {
        if position == 0 || position >= self.rows.len() {
            return false;
        }
        let interval_s = self.rows[position].interval_ms as f32 / 1000.0;
        interval_s > 0.0 && interval_s < threshold_s
    }

    /// Groups of consecutive rows separated by less than the battle
    /// threshold. Every group holds at least two cars, and a row belongs
    /// to at most one group.
    pub fn battles(&self) -> Vec<Vec<LeaderboardRow>> {
        let mut battles = Vec::new();
        let mut current: Vec<LeaderboardRow> = Vec::new();

        for i in 1..self.rows.len() {
            if self.battle_for(i, BATTLE_THRESHOLD_S) {
                if current.is_empty() {
                    current.push(self.rows[i - 1].clone());
                }
                current.push(self.rows[i].clone());
            } else if current.len() >= 2 {
                battles.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
        if current.len() >= 2 {
            battles.push(current);
        }

        battles
    }

    /// Fastest lap of the session with its driver.
    pub fn fastest_lap(&self) -> Option<(i32, String)> {
        self.rows
            .iter()
            .filter(|row| row.best_lap_ms > 0)
            .min_by_key(|row| row.best_lap_ms)
            .map(|row| (row.best_lap_ms, row.driver_name.clone()))
    }

    /// Qualifying order: by best lap, timeless cars at the bottom,
    /// positions renumbered.
    pub fn sort_by_best_lap(&mut self) {
        self.rows.sort_by_key(|row| {
            if row.best_lap_ms > 0 { (0, row.best_lap_ms) } else { (1, 0) }
        });
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.position = i as u16 + 1;
        }
    }
}

/// Gap of `row` behind `reference` in (ms, formatted) form.
fn gap_to(
    reference: (u16, f32),
    row: (u16, f32),
    reference_lap_ms: i32,
    lap_suffix_long: bool,
) -> (i32, String) {
    let (ref_laps, ref_spline) = reference;
    let (laps, spline) = row;
    let lap_diff = ref_laps as i32 - laps as i32;

    if lap_diff > 0 {
        let ms = lap_diff * reference_lap_ms;
        let text = if lap_suffix_long {
            if lap_diff > 1 { format!("+{lap_diff} Laps") } else { format!("+{lap_diff} Lap") }
        } else {
            format!("+{lap_diff} L")
        };
        (ms, text)
    } else {
        let mut spline_diff = ref_spline - spline;
        if spline_diff < 0.0 {
            spline_diff += 1.0;
        }
        let ms = (spline_diff * reference_lap_ms as f32) as i32;
        (ms, format_time_gap(ms))
    }
}

/// "+S.sss" below one minute, "+M:SS.sss" beyond, "---" for nothing.
fn format_time_gap(ms: i32) -> String {
    if ms <= 0 {
        return "---".into();
    }
    let seconds = ms as f64 / 1000.0;
    if seconds < 60.0 {
        format!("+{seconds:.3}")
    } else {
        let minutes = (seconds / 60.0) as i64;
        let rest = seconds - minutes as f64 * 60.0;
        format!("+{minutes}:{rest:06.3}")
    }
}
