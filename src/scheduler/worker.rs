//! Per-source state machine.
//!
//! One `SourceWorker` owns everything the two cadences of a source share:
//! the stored state matrix, the armed flag and the known slot types. Every
//! tick runs inside the same mutex, so a probe-triggered sync and a
//! cadence-driven sync of one source never overlap.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::error::Result;
use crate::models::{SourceConfig, StateMatrix};
use crate::pipeline::{ScheduleReader, SyncReport, Syncer, states_equal};
use crate::services::ChangeNotifier;

/// Scheduler phase of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    ProbeArmed,
    SyncInFlight,
}

/// Snapshot published after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub source_id: String,
    pub phase: Phase,
    pub probe_armed: bool,
    pub slot_types: Vec<String>,
    pub matrix_len: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_rearm_on: Option<NaiveDate>,
}

/// Result of one probe tick.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Probe is disarmed
    Skipped,
    /// State scrape produced nothing to compare
    NoData,
    Unchanged,
    /// A change was seen and a full sync ran
    Changed { report: SyncReport, notified: bool },
}

#[derive(Default)]
struct SourceState {
    slot_types: Vec<String>,
    states: StateMatrix,
    probe_armed: bool,
    last_sync: Option<DateTime<Utc>>,
    last_rearm_on: Option<NaiveDate>,
}

pub struct SourceWorker {
    syncer: Syncer,
    notifier: ChangeNotifier,
    reader: ScheduleReader,
    state: Mutex<SourceState>,
    status: watch::Sender<WorkerStatus>,
}

impl SourceWorker {
    pub fn new(syncer: Syncer, notifier: ChangeNotifier) -> Self {
        let reader = ScheduleReader::new(Arc::clone(syncer.materializer().store()));
        let (status, _) = watch::channel(WorkerStatus {
            source_id: syncer.source().id.clone(),
            phase: Phase::Idle,
            probe_armed: false,
            slot_types: Vec::new(),
            matrix_len: 0,
            last_sync: None,
            last_rearm_on: None,
        });
        Self {
            syncer,
            notifier,
            reader,
            state: Mutex::new(SourceState::default()),
            status,
        }
    }

    pub fn source(&self) -> &Arc<SourceConfig> {
        self.syncer.source()
    }

    pub fn id(&self) -> &str {
        &self.source().id
    }

    /// Latest published status. Never waits for a running tick.
    pub fn status(&self) -> WorkerStatus {
        self.status.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.status.borrow().phase
    }

    /// Follow status changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    /// Initial full sync: seeds the state matrix and arms the probe.
    ///
    /// The probe is armed even if the sync fails; an empty seed makes the
    /// first successful probe scrape count as a change.
    pub async fn seed(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        let mut state = self.state.lock().await;
        let result = self.run_sync(&mut state, now).await;

        let fresh = match &result {
            Ok(report) => report.states.clone(),
            Err(_) => StateMatrix::default(),
        };
        if fresh.is_empty() {
            match self.reader.stored_states(self.id()).await {
                Ok(stored) if !stored.is_empty() => {
                    log::info!("[{}] seeded {} slot states from the store", self.id(), stored.len());
                    state.states = stored;
                }
                Ok(_) => log::warn!("[{}] no slot states to seed from", self.id()),
                Err(e) => log::warn!("[{}] reading stored slot states failed: {e}", self.id()),
            }
        } else {
            self.adopt_states(&mut state, fresh).await;
        }

        state.probe_armed = true;
        self.publish(&state, false);
        log::info!("[{}] probe armed", self.id());
        result
    }

    /// One probe tick: compare a fresh state matrix with the stored one and
    /// run a full sync if they differ.
    pub async fn probe_tick(&self, now: DateTime<Utc>) -> Result<ProbeOutcome> {
        let mut state = self.state.lock().await;
        if !state.probe_armed {
            return Ok(ProbeOutcome::Skipped);
        }

        let fresh = self.syncer.scrape_states(&state.slot_types).await;
        if fresh.is_empty() {
            return Ok(ProbeOutcome::NoData);
        }
        if states_equal(&state.states, &fresh) {
            log::debug!("[{}] probe: unchanged", self.id());
            return Ok(ProbeOutcome::Unchanged);
        }

        log::info!(
            "[{}] probe: slot states changed ({} updated), running full sync",
            self.id(),
            fresh.updated_count()
        );
        let report = self.run_sync(&mut state, now).await?;
        if !report.wrote() {
            // Nothing materialized; stay armed and retry on the next tick.
            return Ok(ProbeOutcome::Changed {
                report,
                notified: false,
            });
        }

        let adopted = if report.states.is_empty() {
            fresh
        } else {
            report.states.clone()
        };
        self.adopt_states(&mut state, adopted).await;

        let notified = self.notifier.notify_change(self.source()).await;
        state.probe_armed = false;
        self.publish(&state, false);
        log::info!("[{}] probe disarmed until the next daily arm", self.id());

        Ok(ProbeOutcome::Changed { report, notified })
    }

    /// One full-sync cadence tick.
    ///
    /// Re-arms the probe on the first tick at or after the daily arm time,
    /// whatever the sync itself then does.
    pub async fn full_sync_tick(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        let mut state = self.state.lock().await;

        let local = self.source().local(now)?;
        let today = local.date_naive();
        if local.time() >= self.source().arm_at()? && state.last_rearm_on != Some(today) {
            state.last_rearm_on = Some(today);
            if !state.probe_armed {
                log::info!("[{}] daily re-arm of the probe", self.id());
            }
            state.probe_armed = true;
            self.publish(&state, false);
        }

        self.cadence_sync(&mut state, now).await
    }

    /// Run a full sync now, outside both cadences.
    pub async fn force_full_sync(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        let mut state = self.state.lock().await;
        log::info!("[{}] forced full sync", self.id());
        self.cadence_sync(&mut state, now).await
    }

    pub async fn arm(&self) {
        let mut state = self.state.lock().await;
        state.probe_armed = true;
        self.publish(&state, false);
    }

    pub async fn disarm(&self) {
        let mut state = self.state.lock().await;
        state.probe_armed = false;
        self.publish(&state, false);
    }

    async fn run_sync(&self, state: &mut SourceState, now: DateTime<Utc>) -> Result<SyncReport> {
        self.publish(state, true);
        let result = self.syncer.run(&state.slot_types, now).await;
        if let Ok(report) = &result {
            state.slot_types = report.slot_types.clone();
            if report.wrote() {
                state.last_sync = Some(report.finished_at);
            }
        }
        self.publish(state, false);
        result
    }

    /// Full sync outside the probe path. A freshly scraped matrix replaces
    /// the stored one; the probe state is left alone.
    async fn cadence_sync(&self, state: &mut SourceState, now: DateTime<Utc>) -> Result<SyncReport> {
        let report = self.run_sync(state, now).await?;
        if !report.states.is_empty() {
            self.adopt_states(state, report.states.clone()).await;
            self.publish(state, false);
        }
        Ok(report)
    }

    async fn adopt_states(&self, state: &mut SourceState, matrix: StateMatrix) {
        if let Err(e) = self
            .syncer
            .materializer()
            .replace_states(self.id(), &matrix)
            .await
        {
            log::warn!("[{}] persisting slot states failed: {e}", self.id());
        }
        state.states = matrix;
    }

    fn publish(&self, state: &SourceState, in_flight: bool) {
        let phase = if in_flight {
            Phase::SyncInFlight
        } else if state.probe_armed {
            Phase::ProbeArmed
        } else {
            Phase::Idle
        };
        self.status.send_replace(WorkerStatus {
            source_id: self.id().to_string(),
            phase,
            probe_armed: state.probe_armed,
            slot_types: state.slot_types.clone(),
            matrix_len: state.states.len(),
            last_sync: state.last_sync,
            last_rearm_on: state.last_rearm_on,
        });
    }
}
