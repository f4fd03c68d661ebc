use std::{collections::HashMap, path::Path};

use log::{debug, info, warn};

use crate::{
    first_seen::{FirstSeenKey, FirstSeenStore},
    model::{normalize, CellIdentity, CellObservation, RawReading},
    session_log::SessionLog,
    timestamp::{format_timestamp, Clock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    New,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub new: usize,
    pub updated: usize,
}

/// Every cell seen during this process, in first-seen order. Entries are
/// never removed.
#[derive(Debug, Default)]
pub struct CellRegistry {
    cells: Vec<CellObservation>,
    index: HashMap<CellIdentity, usize>,
}

impl CellRegistry {
    pub fn get(&self, identity: &CellIdentity) -> Option<&CellObservation> {
        self.index.get(identity).map(|&i| &self.cells[i])
    }

    fn get_mut(&mut self, identity: &CellIdentity) -> Option<&mut CellObservation> {
        self.index.get(identity).map(|&i| &mut self.cells[i])
    }

    fn insert(&mut self, identity: CellIdentity, observation: CellObservation) {
        self.index.insert(identity, self.cells.len());
        self.cells.push(observation);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn snapshot(&self) -> Vec<CellObservation> {
        self.cells.clone()
    }
}

/// Deduplicates observations, keeps their first/last seen times and mirrors
/// them into the session log.
///
/// Log and store failures are logged and otherwise ignored: losing a write
/// must not stop the next poll.
pub struct Tracker {
    registry: CellRegistry,
    log: Option<SessionLog>,
    first_seen: Box<dyn FirstSeenStore>,
    first_seen_key: FirstSeenKey,
    clock: Box<dyn Clock>,
}

impl Tracker {
    pub fn new(first_seen: Box<dyn FirstSeenStore>, clock: Box<dyn Clock>) -> Self {
        Self {
            registry: CellRegistry::default(),
            log: None,
            first_seen,
            first_seen_key: FirstSeenKey::default(),
            clock,
        }
    }

    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_first_seen_key(mut self, key: FirstSeenKey) -> Self {
        self.first_seen_key = key;
        self
    }

    pub fn registry(&self) -> &CellRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> Vec<CellObservation> {
        self.registry.snapshot()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(SessionLog::path)
    }

    pub fn record(&mut self, mut observation: CellObservation) -> RecordOutcome {
        let identity = CellIdentity::of(&observation);
        let now = format_timestamp(&self.clock.now());

        if let Some(entry) = self.registry.get_mut(&identity) {
            entry.signal_strength_dbm = observation.signal_strength_dbm;
            entry.last_seen = now;
            debug!("{identity}: {} dBm", entry.signal_strength_dbm);

            if let Some(log) = &mut self.log {
                if let Err(e) = log.update(&identity, entry) {
                    warn!("failed to update log row of {identity}: {e}");
                }
            }
            return RecordOutcome::Updated;
        }

        let key = self.first_seen_key.key_for(&observation, &identity);
        observation.first_seen = match self.first_seen.get_or_insert(&key, &now) {
            Ok(x) => x,
            Err(e) => {
                warn!("first seen of {identity} not persisted: {e}");
                now.clone()
            }
        };
        observation.last_seen = now;

        if let Some(log) = &mut self.log {
            if let Err(e) = log.append(&identity, &observation) {
                warn!("failed to log {identity}: {e}");
            }
        }
        info!(
            "new cell {identity} ({}, {} dBm)",
            observation.operator_name, observation.signal_strength_dbm
        );
        self.registry.insert(identity, observation);

        RecordOutcome::New
    }

    pub fn record_batch(&mut self, readings: &[RawReading]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for reading in readings {
            match self.record(normalize(reading)) {
                RecordOutcome::New => summary.new += 1,
                RecordOutcome::Updated => summary.updated += 1,
            }
        }
        summary
    }
}
