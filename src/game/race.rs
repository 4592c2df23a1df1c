//! Race state machine and per-race tick loop

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::catalog::{Car, Track};

use super::physics::PhysicsSystem;
use super::results::{RaceResults, RaceStatus};

/// State-machine violations reported to callers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaceError {
    #[error("Race cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: RaceStatus, to: RaceStatus },

    #[error("Race is not in progress (status {status:?})")]
    RaceNotActive { status: RaceStatus },

    #[error("Race already finished")]
    AlreadyFinished,
}

/// Listing entry for a race
#[derive(Debug, Clone, Serialize)]
pub struct RaceSummary {
    pub id: u64,
    pub track_id: u32,
    pub player_id: u32,
    pub status: RaceStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Mutable race state (guarded by the race mutex)
struct RaceState {
    results: RaceResults,
    /// Player inputs received since the last tick
    pending_accelerations: u32,
    finished_at: Option<DateTime<Utc>>,
}

/// Receiving ends handed to the loop task on start
struct RaceSignals {
    accelerate_rx: mpsc::UnboundedReceiver<()>,
    stop_rx: oneshot::Receiver<()>,
}

struct RaceInner {
    id: u64,
    track: Arc<Track>,
    player_id: u32,
    tick_period: Duration,
    created_at: DateTime<Utc>,
    state: Mutex<RaceState>,
    accelerate_tx: mpsc::UnboundedSender<()>,
    /// Taken at most once, so the stop signal can never fire twice
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    signals: Mutex<Option<RaceSignals>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a single race. Cheap to clone; all clones share one race.
#[derive(Clone)]
pub struct Race {
    inner: Arc<RaceInner>,
}

impl Race {
    /// Create an unstarted race of `cars` on `track`, with `player_id`
    /// naming the car driven by the human player.
    pub fn new(
        id: u64,
        track: Arc<Track>,
        cars: &[Car],
        player_id: u32,
        tick_period: Duration,
    ) -> Self {
        let (accelerate_tx, accelerate_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let inner = RaceInner {
            id,
            track,
            player_id,
            tick_period,
            created_at: Utc::now(),
            state: Mutex::new(RaceState {
                results: RaceResults::new(cars),
                pending_accelerations: 0,
                finished_at: None,
            }),
            accelerate_tx,
            stop_tx: Mutex::new(Some(stop_tx)),
            signals: Mutex::new(Some(RaceSignals {
                accelerate_rx,
                stop_rx,
            })),
            loop_handle: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn player_id(&self) -> u32 {
        self.inner.player_id
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.inner.track
    }

    pub fn status(&self) -> RaceStatus {
        self.inner.state.lock().results.status
    }

    /// Consistent copy of the current results
    pub fn results(&self) -> RaceResults {
        self.inner.state.lock().results.clone()
    }

    /// When the race reached its final status, if it has
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().finished_at
    }

    pub fn summary(&self) -> RaceSummary {
        let state = self.inner.state.lock();
        RaceSummary {
            id: self.inner.id,
            track_id: self.inner.track.id,
            player_id: self.inner.player_id,
            status: state.results.status,
            created_at: self.inner.created_at,
            finished_at: state.finished_at,
        }
    }

    /// Move the race to in-progress and spawn its tick loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), RaceError> {
        let signals = {
            let mut state = self.inner.state.lock();
            if state.results.status != RaceStatus::Unstarted {
                return Err(RaceError::InvalidTransition {
                    from: state.results.status,
                    to: RaceStatus::InProgress,
                });
            }
            state.results.status = RaceStatus::InProgress;
            self.inner.signals.lock().take()
        };

        match signals {
            Some(signals) => {
                let handle = tokio::spawn(self.clone().run(signals));
                *self.inner.loop_handle.lock() = Some(handle);
                info!(race_id = self.inner.id, track_id = self.inner.track.id, "Race started");
            }
            None => error!(race_id = self.inner.id, "Race loop signals already consumed"),
        }

        Ok(())
    }

    /// Queue one unit of player input for the next tick. Never blocks.
    pub fn accelerate(&self) -> Result<(), RaceError> {
        let status = self.status();
        if status != RaceStatus::InProgress {
            return Err(RaceError::RaceNotActive { status });
        }

        self.inner
            .accelerate_tx
            .send(())
            .map_err(|_| RaceError::RaceNotActive {
                status: RaceStatus::Finished,
            })
    }

    /// Stop the race now. Finishing an already finished race is a no-op.
    pub fn finish(&self) -> Result<(), RaceError> {
        let mut state = self.inner.state.lock();
        match self.finish_locked(&mut state) {
            Err(RaceError::AlreadyFinished) => {
                debug!(race_id = self.inner.id, "Ignoring finish of finished race");
                Ok(())
            }
            other => other,
        }
    }

    /// Run one physics tick and return the updated results.
    ///
    /// Invoked by the loop once per tick. Races that are not in progress
    /// are returned unchanged.
    pub fn refresh(&self) -> Result<RaceResults, RaceError> {
        let mut state = self.inner.state.lock();
        if state.results.status != RaceStatus::InProgress {
            return Ok(state.results.clone());
        }

        let pending = std::mem::take(&mut state.pending_accelerations);
        let track_length = u32::try_from(self.inner.track.len()).unwrap_or(u32::MAX);
        let all_finished = PhysicsSystem::step(
            &mut state.results.positions,
            self.inner.player_id,
            pending,
            track_length,
        );

        if all_finished {
            self.finish_locked(&mut state)?;
        }

        Ok(state.results.clone())
    }

    /// Wait for the tick loop to exit. Returns at once if it never ran or
    /// another caller is already waiting.
    pub async fn join(&self) {
        let handle = self.inner.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(race_id = self.inner.id, error = %e, "Race loop panicked");
            }
        }
    }

    /// Count one accelerate signal taken off the channel by the loop
    pub(crate) fn record_acceleration(&self) {
        let mut state = self.inner.state.lock();
        if state.results.status == RaceStatus::InProgress {
            state.pending_accelerations = state.pending_accelerations.saturating_add(1);
        }
    }

    fn finish_locked(&self, state: &mut RaceState) -> Result<(), RaceError> {
        match state.results.status {
            RaceStatus::Unstarted => Err(RaceError::InvalidTransition {
                from: RaceStatus::Unstarted,
                to: RaceStatus::Finished,
            }),
            RaceStatus::Finished => Err(RaceError::AlreadyFinished),
            RaceStatus::InProgress => {
                state.results.status = RaceStatus::Finished;
                state.pending_accelerations = 0;
                state.finished_at = Some(Utc::now());

                if let Some(stop_tx) = self.inner.stop_tx.lock().take() {
                    let _ = stop_tx.send(());
                }

                info!(race_id = self.inner.id, "Race finished");
                Ok(())
            }
        }
    }

    /// The race loop: sole consumer of accelerate and stop signals
    async fn run(self, signals: RaceSignals) {
        let RaceSignals {
            mut accelerate_rx,
            mut stop_rx,
        } = signals;

        let period = self.inner.tick_period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => {
                    // Finish has already recorded the status; nothing left to do.
                    break;
                }

                Some(()) = accelerate_rx.recv() => {
                    self.record_acceleration();
                }

                _ = ticker.tick() => {
                    match self.refresh() {
                        Ok(results) => debug!(
                            race_id = self.inner.id,
                            status = ?results.status,
                            "Race tick"
                        ),
                        Err(e) => error!(race_id = self.inner.id, error = %e, "Race tick failed"),
                    }
                }
            }
        }

        debug!(race_id = self.inner.id, "Race loop stopped");
    }
}
