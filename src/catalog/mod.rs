//! Car and track catalog loaded from static data

pub mod car;
pub mod track;

pub use car::Car;
pub use track::{Track, DEFAULT_TRACK_SEGMENTS};

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

/// On-disk catalog layout
#[derive(Debug, Deserialize)]
struct CatalogData {
    #[serde(default)]
    cars: Vec<Car>,
    #[serde(default)]
    tracks: Vec<Track>,
}

/// Immutable reference data shared by every race
#[derive(Debug, Default)]
pub struct Catalog {
    cars: Vec<Car>,
    tracks: Vec<Arc<Track>>,
}

impl Catalog {
    /// Load the catalog from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            cars = catalog.cars.len(),
            tracks = catalog.tracks.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Decode the catalog from any JSON source
    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_reader(reader)?;
        Self::from_parts(data.cars, data.tracks)
    }

    /// Build a catalog from already decoded cars and tracks
    pub fn from_parts(cars: Vec<Car>, tracks: Vec<Track>) -> Result<Self, CatalogError> {
        let mut car_ids = HashSet::with_capacity(cars.len());
        if let Some(car) = cars.iter().find(|car| !car_ids.insert(car.id)) {
            return Err(CatalogError::DuplicateCar(car.id));
        }

        let tracks = tracks
            .into_iter()
            .map(|mut track| {
                if track.is_empty() {
                    debug!(track_id = track.id, "Generating layout for track without segments");
                    track.generate_segments(DEFAULT_TRACK_SEGMENTS);
                }
                if let Some((index, degree)) = track.invalid_segment() {
                    return Err(CatalogError::InvalidSegment {
                        track_id: track.id,
                        index,
                        degree,
                    });
                }
                Ok(Arc::new(track))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { cars, tracks })
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn lookup_car(&self, id: u32) -> Option<&Car> {
        self.cars.iter().find(|car| car.id == id)
    }

    pub fn lookup_track(&self, id: u32) -> Option<Arc<Track>> {
        self.tracks.iter().find(|track| track.id == id).cloned()
    }
}

/// Catalog loading errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to open catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Car id {0} appears more than once")]
    DuplicateCar(u32),

    #[error("Track {track_id} segment {index} turns {degree} degrees, limit is 90")]
    InvalidSegment {
        track_id: u32,
        index: usize,
        degree: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "cars": [
            {"id": 1, "name": "Racer", "acceleration": 30, "top_speed": 100},
            {"id": 2, "name": "Truck", "acceleration": 10, "top_speed": 60}
        ],
        "tracks": [
            {"id": 1, "name": "Oval", "segments": [0, 45, 90, 0, -45, -90]},
            {"id": 2, "name": "Generated"}
        ]
    }"#;

    #[test]
    fn decodes_cars_and_tracks() {
        let catalog = Catalog::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(catalog.cars().len(), 2);
        assert_eq!(catalog.lookup_car(2).map(|c| c.top_speed), Some(60));
        assert_eq!(catalog.lookup_track(1).map(|t| t.len()), Some(6));
    }

    #[test]
    fn generates_segments_for_tracks_without_layout() {
        let catalog = Catalog::from_reader(SAMPLE.as_bytes()).unwrap();
        let track = catalog.lookup_track(2).unwrap();
        assert_eq!(track.len(), DEFAULT_TRACK_SEGMENTS);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let catalog = Catalog::from_reader(SAMPLE.as_bytes()).unwrap();
        assert!(catalog.lookup_car(99).is_none());
        assert!(catalog.lookup_track(99).is_none());
    }

    #[test]
    fn rejects_sharp_segments() {
        let data = r#"{"cars": [], "tracks": [{"id": 4, "name": "Bad", "segments": [0, 91]}]}"#;
        let err = Catalog::from_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidSegment { track_id: 4, index: 1, .. }
        ));
    }

    #[test]
    fn rejects_duplicate_car_ids() {
        let data = r#"{
            "cars": [
                {"id": 1, "name": "Racer", "acceleration": 30, "top_speed": 100},
                {"id": 2, "name": "Truck", "acceleration": 10, "top_speed": 60},
                {"id": 1, "name": "Clone", "acceleration": 50, "top_speed": 200}
            ],
            "tracks": []
        }"#;
        let err = Catalog::from_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCar(1)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = Catalog::from_reader("{\"cars\": [".as_bytes()).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn bundled_data_file_loads() {
        let catalog =
            Catalog::from_json_file(concat!(env!("CARGO_MANIFEST_DIR"), "/data.json")).unwrap();
        assert!(!catalog.cars().is_empty());
        assert!(catalog.tracks().iter().all(|t| !t.is_empty()));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Catalog::from_json_file("/nonexistent/catalog.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/catalog.json"));
    }
}
