//! Car reference data

use serde::{Deserialize, Serialize};

/// A car from the catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: u32,
    pub name: String,
    /// Speed gained per tick by an AI driver
    pub acceleration: i32,
    /// Hard upper bound on speed
    pub top_speed: i32,
}
