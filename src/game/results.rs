//! Race results: the externally visible snapshot of a race

use serde::{Deserialize, Serialize};

use crate::catalog::Car;

/// Race lifecycle status. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RaceStatus {
    /// Created, loop not yet running
    Unstarted,
    /// Loop running, accepting accelerate input
    InProgress,
    /// Every car crossed the line or the race was stopped
    Finished,
}

/// A catalog car projected into one race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarPosition {
    #[serde(flatten)]
    pub car: Car,
    pub speed: i32,
    /// Segments travelled, capped at the track length
    pub segment: u32,
    /// Finishing rank, set once the car reaches the end of the track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_position: Option<u32>,
}

impl CarPosition {
    pub fn new(car: Car) -> Self {
        Self {
            car,
            speed: 0,
            segment: 0,
            final_position: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.final_position.is_some()
    }
}

/// Point-in-time view of a race. Positions keep entry order, not rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResults {
    pub status: RaceStatus,
    pub positions: Vec<CarPosition>,
}

impl RaceResults {
    pub fn new(cars: &[Car]) -> Self {
        Self {
            status: RaceStatus::Unstarted,
            positions: cars.iter().cloned().map(CarPosition::new).collect(),
        }
    }
}
