//! Per-car location state machine with lap-cross detection.
//!
//! The spline wraps from ~1.0 back to 0.0 at the start/finish line. A wrap
//! only counts as a completed lap when the car stays on track through it,
//! or stays in the pit lane having entered through pit entry (drive-through
//! and pit-stop laps).

use std::collections::HashMap;

use crate::protocol::enums::CarLocation;

/// Spline position above which a drop is treated as a wrap.
const WRAP_THRESHOLD: f32 = 0.99;

/// Tracked state of one car.
#[derive(Debug, Clone, Copy)]
pub struct CarPosition {
    pub car_index: u16,
    pub lap_count: u32,
    pub spline_position: f32,
    pub location: CarLocation,
    pub previous_location: CarLocation,
}

impl CarPosition {
    fn new(car_index: u16) -> Self {
        CarPosition {
            car_index,
            lap_count: 0,
            spline_position: 0.0,
            location: CarLocation::None,
            previous_location: CarLocation::None,
        }
    }
}

/// Location state for the whole field.
#[derive(Debug, Default)]
pub struct PositionGraph {
    cars: HashMap<u16, CarPosition>,
}

impl PositionGraph {
    pub fn new() -> Self {
        PositionGraph::default()
    }

    pub fn car(&self, car_index: u16) -> Option<CarPosition> {
        self.cars.get(&car_index).copied()
    }

    pub fn remove_car(&mut self, car_index: u16) {
        self.cars.remove(&car_index);
    }

    /// Feeds a new spline/location observation for a car.
    pub fn observe(&mut self, car_index: u16, spline: f32, location: CarLocation) {
        let car = self.cars.entry(car_index).or_insert_with(|| CarPosition::new(car_index));

        let wrapped = car.spline_position > WRAP_THRESHOLD && spline < car.spline_position;
        if wrapped {
            let on_track_both_sides =
                car.location == CarLocation::Track && location == CarLocation::Track;
            let through_pits = car.location == CarLocation::Pitlane
                && location == CarLocation::Pitlane
                && car.previous_location == CarLocation::PitEntry;
            if on_track_both_sides || through_pits {
                car.lap_count += 1;
            }
        }

        if location != car.location {
            car.previous_location = car.location;
            car.location = location;
        }
        car.spline_position = spline;
    }

    /// Resets every car's state, keeping the set of cars.
    pub fn reset(&mut self) {
        for car in self.cars.values_mut() {
            *car = CarPosition::new(car.car_index);
        }
    }

    pub fn clear(&mut self) {
        self.cars.clear();
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }
}
