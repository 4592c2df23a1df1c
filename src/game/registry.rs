//! Registry of races, keyed by numeric race id

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, info};

use crate::catalog::Catalog;

use super::race::{Race, RaceError, RaceSummary};
use super::results::{RaceResults, RaceStatus};

/// Registry-level failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Race {0} not found")]
    RaceNotFound(u64),

    #[error("Car {0} not found")]
    CarNotFound(u32),

    #[error("Track {0} not found")]
    TrackNotFound(u32),

    #[error(transparent)]
    Race(#[from] RaceError),
}

/// Creates races from the catalog and hands them out by id
pub struct RaceRegistry {
    catalog: Arc<Catalog>,
    tick_period: Duration,
    races: DashMap<u64, Race>,
    next_id: AtomicU64,
}

impl RaceRegistry {
    pub fn new(catalog: Arc<Catalog>, tick_period: Duration) -> Self {
        Self {
            catalog,
            tick_period,
            races: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create an unstarted race on `track_id` where the player drives car
    /// `player_id`. Every catalog car takes part, in catalog order.
    pub fn create_race(&self, player_id: u32, track_id: u32) -> Result<Race, RegistryError> {
        let track = self
            .catalog
            .lookup_track(track_id)
            .ok_or(RegistryError::TrackNotFound(track_id))?;
        if self.catalog.lookup_car(player_id).is_none() {
            return Err(RegistryError::CarNotFound(player_id));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let race = Race::new(id, track, self.catalog.cars(), player_id, self.tick_period);
        self.races.insert(id, race.clone());

        info!(race_id = id, track_id, player_id, "Race created");
        Ok(race)
    }

    pub fn get(&self, id: u64) -> Result<Race, RegistryError> {
        self.races
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(RegistryError::RaceNotFound(id))
    }

    /// Summaries of every race, oldest first
    pub fn list(&self) -> Vec<RaceSummary> {
        let mut summaries: Vec<RaceSummary> =
            self.races.iter().map(|r| r.value().summary()).collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    pub fn results(&self, id: u64) -> Result<RaceResults, RegistryError> {
        Ok(self.get(id)?.results())
    }

    pub fn start(&self, id: u64) -> Result<(), RegistryError> {
        Ok(self.get(id)?.start()?)
    }

    pub fn accelerate(&self, id: u64) -> Result<(), RegistryError> {
        Ok(self.get(id)?.accelerate()?)
    }

    pub fn finish(&self, id: u64) -> Result<(), RegistryError> {
        Ok(self.get(id)?.finish()?)
    }

    pub fn total_races(&self) -> usize {
        self.races.len()
    }

    pub fn active_races(&self) -> usize {
        self.races
            .iter()
            .filter(|r| r.value().status() == RaceStatus::InProgress)
            .count()
    }

    /// Drop races that finished at least `retention` ago. Unstarted and
    /// running races are never evicted. Returns how many were dropped.
    pub fn evict_finished(&self, retention: Duration) -> usize {
        let now = Utc::now();
        let before = self.races.len();
        self.races.retain(|id, race| {
            let expired = race.finished_at().is_some_and(|finished_at| {
                now.signed_duration_since(finished_at)
                    .to_std()
                    .is_ok_and(|age| age >= retention)
            });
            if expired {
                debug!(race_id = *id, "Evicting finished race");
            }
            !expired
        });

        let evicted = before.saturating_sub(self.races.len());
        if evicted > 0 {
            info!(evicted, remaining = self.races.len(), "Finished races evicted");
        }
        evicted
    }

    /// Stop every running race and wait for their loops to exit
    pub async fn finish_all(&self) {
        let running: Vec<Race> = self
            .races
            .iter()
            .filter(|r| r.value().status() == RaceStatus::InProgress)
            .map(|r| r.value().clone())
            .collect();

        for race in &running {
            let _ = race.finish();
        }
        join_all(running.iter().map(Race::join)).await;

        info!(stopped = running.len(), "All races finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Car, Track};
    use tokio_test::assert_ok;

    fn registry() -> RaceRegistry {
        let cars = vec![
            Car {
                id: 1,
                name: "Racer".to_string(),
                acceleration: 30,
                top_speed: 100,
            },
            Car {
                id: 2,
                name: "Truck".to_string(),
                acceleration: 10,
                top_speed: 60,
            },
        ];
        let tracks = vec![Track {
            id: 5,
            name: "Oval".to_string(),
            segments: vec![0.0; 8],
        }];
        let catalog = Catalog::from_parts(cars, tracks).unwrap();
        RaceRegistry::new(Arc::new(catalog), Duration::from_secs(1))
    }

    #[test]
    fn creates_races_with_increasing_ids() {
        let registry = registry();
        let first = registry.create_race(1, 5).unwrap();
        let second = registry.create_race(2, 5).unwrap();

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(second.player_id(), 2);
        assert_eq!(first.results().positions.len(), 2);
        assert_eq!(first.track().len(), 8);

        let ids: Vec<u64> = registry.list().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn unknown_track_or_car_is_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.create_race(1, 99),
            Err(RegistryError::TrackNotFound(99))
        ));
        assert!(matches!(
            registry.create_race(42, 5),
            Err(RegistryError::CarNotFound(42))
        ));
        assert_eq!(registry.total_races(), 0);
    }

    #[test]
    fn unknown_race_is_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.accelerate(3),
            Err(RegistryError::RaceNotFound(3))
        ));
        assert!(matches!(registry.results(3), Err(RegistryError::RaceNotFound(3))));
    }

    #[test]
    fn state_machine_errors_pass_through() {
        let registry = registry();
        let race = registry.create_race(1, 5).unwrap();
        assert!(matches!(
            registry.accelerate(race.id()),
            Err(RegistryError::Race(RaceError::RaceNotActive { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_all_stops_running_races() {
        let registry = registry();
        let running = registry.create_race(1, 5).unwrap();
        let idle = registry.create_race(2, 5).unwrap();
        assert_ok!(registry.start(running.id()));
        assert_eq!(registry.active_races(), 1);

        registry.finish_all().await;

        assert_eq!(running.status(), RaceStatus::Finished);
        assert_eq!(idle.status(), RaceStatus::Unstarted);
        assert_eq!(registry.active_races(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_only_finished_races() {
        let registry = registry();
        let done = registry.create_race(1, 5).unwrap();
        let running = registry.create_race(1, 5).unwrap();
        let idle = registry.create_race(2, 5).unwrap();
        assert_ok!(registry.start(done.id()));
        assert_ok!(registry.start(running.id()));
        assert_ok!(registry.finish(done.id()));
        done.join().await;

        // Long retention keeps a freshly finished race readable.
        assert_eq!(registry.evict_finished(Duration::from_secs(3600)), 0);
        assert_eq!(registry.total_races(), 3);

        assert_eq!(registry.evict_finished(Duration::ZERO), 1);
        assert!(matches!(
            registry.results(done.id()),
            Err(RegistryError::RaceNotFound(_))
        ));
        assert_ok!(registry.results(running.id()));
        assert_ok!(registry.results(idle.id()));
        assert_eq!(registry.total_races(), 2);

        // Ids are never reused after eviction.
        assert_eq!(registry.create_race(1, 5).unwrap().id(), 4);

        assert_ok!(registry.finish(running.id()));
    }
}
