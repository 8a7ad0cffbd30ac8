//! Tyre temperature regimes and wear projection.

/// Wear samples retained for the rate projection.
const WEAR_WINDOW: usize = 100;

/// Corner positions, in the simulator's wheel-array order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Corner {
    FrontLeft = 0,
    FrontRight = 1,
    RearLeft = 2,
    RearRight = 3,
}

impl Corner {
    pub const ALL: [Corner; 4] =
        [Corner::FrontLeft, Corner::FrontRight, Corner::RearLeft, Corner::RearRight];
}

/// Fitted tyre compound; decides the optimal temperature window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compound {
    #[default]
    Dry,
    Wet,
}

impl Compound {
    /// Optimal surface temperature range, °C.
    pub fn optimal_range(self) -> (f32, f32) {
        match self {
            Compound::Dry => (75.0, 95.0),
            Compound::Wet => (50.0, 80.0),
        }
    }
}

/// Temperature regime of one tyre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempRegime {
    Cold,
    Underheating,
    Optimal,
    Overheating,
}

/// Current state of one tyre.
#[derive(Debug, Clone, Copy, Default)]
pub struct TyreState {
    pub pressure_psi: f32,
    /// Mean of inner/middle/outer surface temperatures.
    pub surface_temp_c: f32,
    pub inner_temp_c: f32,
    pub middle_temp_c: f32,
    pub outer_temp_c: f32,
    pub core_temp_c: f32,
    pub wear: f32,
    pub brake_temp_c: f32,
}

impl TyreState {
    pub fn regime(&self, compound: Compound) -> TempRegime {
        let (min, max) = compound.optimal_range();
        if self.surface_temp_c < 50.0 {
            TempRegime::Cold
        } else if self.surface_temp_c < min - 10.0 {
            TempRegime::Underheating
        } else if self.surface_temp_c > max + 10.0 {
            TempRegime::Overheating
        } else {
            TempRegime::Optimal
        }
    }

    /// Camber is about right when the inner edge runs 5-10 °C hotter than
    /// the outer.
    pub fn camber_in_window(&self) -> bool {
        let spread = self.inner_temp_c - self.outer_temp_c;
        (5.0..=10.0).contains(&spread)
    }
}

/// Per-corner tyre monitoring for the player car.
#[derive(Debug, Default)]
pub struct TyreMonitor {
    tyres: [TyreState; 4],
    compound: Compound,
    wear_history: Vec<[f32; 4]>,
}

impl TyreMonitor {
    pub fn new() -> Self {
        TyreMonitor::default()
    }

    pub fn set_compound(&mut self, compound: Compound) {
        self.compound = compound;
    }

    pub fn compound(&self) -> Compound {
        self.compound
    }

    /// Feeds one physics sample's wheel arrays.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        pressures: [f32; 4],
        inner: [f32; 4],
        middle: [f32; 4],
        outer: [f32; 4],
        core: [f32; 4],
        wear: [f32; 4],
        brake_temps: [f32; 4],
    ) {
        for i in 0..4 {
            self.tyres[i] = TyreState {
                pressure_psi: pressures[i],
                surface_temp_c: (inner[i] + middle[i] + outer[i]) / 3.0,
                inner_temp_c: inner[i],
                middle_temp_c: middle[i],
                outer_temp_c: outer[i],
                core_temp_c: core[i],
                wear: wear[i],
                brake_temp_c: brake_temps[i],
            };
        }

        self.wear_history.push(wear);
        if self.wear_history.len() > WEAR_WINDOW {
            self.wear_history.remove(0);
        }
    }

    pub fn tyre(&self, corner: Corner) -> TyreState {
        self.tyres[corner as usize]
    }

    pub fn all(&self) -> [TyreState; 4] {
        self.tyres
    }

    pub fn regime(&self, corner: Corner) -> TempRegime {
        self.tyre(corner).regime(self.compound)
    }

    pub fn average_wear(&self) -> f32 {
        self.tyres.iter().map(|t| t.wear).sum::<f32>() / 4.0
    }

    pub fn average_temp(&self) -> f32 {
        self.tyres.iter().map(|t| t.surface_temp_c).sum::<f32>() / 4.0
    }

    pub fn average_pressure(&self) -> f32 {
        self.tyres.iter().map(|t| t.pressure_psi).sum::<f32>() / 4.0
    }

    pub fn all_optimal(&self) -> bool {
        Corner::ALL.iter().all(|&c| self.regime(c) == TempRegime::Optimal)
    }

    pub fn any_overheating(&self) -> bool {
        Corner::ALL.iter().any(|&c| self.regime(c) == TempRegime::Overheating)
    }

    pub fn any_cold(&self) -> bool {
        Corner::ALL.iter().any(|&c| self.regime(c) == TempRegime::Cold)
    }

    /// Mean wear increase per retained sample: (last - first) / samples.
    pub fn wear_rate(&self) -> f32 {
        if self.wear_history.len() < 2 {
            return 0.0;
        }
        let first = self.wear_history.first().unwrap();
        let last = self.wear_history.last().unwrap();
        let delta: f32 = (0..4).map(|i| last[i] - first[i]).sum::<f32>() / 4.0;
        delta / self.wear_history.len() as f32
    }

    /// Samples left until wear-out at the current rate.
    pub fn estimated_life_remaining(&self) -> f32 {
        let rate = self.wear_rate();
        if rate <= 0.0 {
            return f32::INFINITY;
        }
        (1.0 - self.average_wear()) / rate
    }

    /// Change when the set averages over 80 % wear or any tyre passes
    /// 90 %.
    pub fn should_change(&self) -> bool {
        self.average_wear() > 0.8 || self.tyres.iter().any(|t| t.wear > 0.9)
    }

    /// Left-right surface temperature difference per axle.
    pub fn temp_balance(&self) -> (f32, f32) {
        let front = self.tyres[Corner::FrontLeft as usize].surface_temp_c
            - self.tyres[Corner::FrontRight as usize].surface_temp_c;
        let rear = self.tyres[Corner::RearLeft as usize].surface_temp_c
            - self.tyres[Corner::RearRight as usize].surface_temp_c;
        (front, rear)
    }

    pub fn reset(&mut self) {
        self.tyres = [TyreState::default(); 4];
        self.wear_history.clear();
    }
}
