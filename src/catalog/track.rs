//! Track layouts and segment generation

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Absolute value of the sharpest turn a single segment may have
pub const MAX_TURN_DEGREE: f64 = 90.0;

/// Segments given to a track whose data carries none
pub const DEFAULT_TRACK_SEGMENTS: usize = 60;

/// A track is an ordered run of segments, each holding its turn in degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub segments: Vec<f64>,
}

impl Track {
    /// Track length in segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment whose turn is outside `[-MAX_TURN_DEGREE, MAX_TURN_DEGREE]`
    pub fn invalid_segment(&self) -> Option<(usize, f64)> {
        self.segments
            .iter()
            .copied()
            .enumerate()
            .find(|(_, degree)| !degree.is_finite() || degree.abs() > MAX_TURN_DEGREE)
    }

    /// Fill in a layout for tracks loaded without one.
    ///
    /// Layouts are seeded from the track id so every load of the same
    /// catalog produces the same track. Roughly half the segments are
    /// straight, the rest turn by a whole number of degrees.
    pub fn generate_segments(&mut self, count: usize) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.id as u64);
        self.segments = (0..count)
            .map(|_| {
                if rng.gen_bool(0.5) {
                    0.0
                } else {
                    rng.gen_range(-MAX_TURN_DEGREE as i32..=MAX_TURN_DEGREE as i32) as f64
                }
            })
            .collect();
    }
}
