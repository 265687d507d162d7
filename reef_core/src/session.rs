//! Session state: the current measurement log and its refresh sequencing.
//!
//! The log is held as an `Arc` and replaced wholesale, so a reader holding a
//! snapshot sees either the old or the new log, never a mix. Every refresh
//! takes a ticket; a fetch that resolves after a newer refresh was issued is
//! discarded.

use crate::dosing::{estimate, DoseRequest, DosingParams, DosingPlan};
use crate::{Measurement, MeasurementLog, MeasurementSource, NewEntry, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Sequence number handed out when a refresh starts
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

/// What happened to a fetched log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched log replaced the session log
    Installed { entries: usize },
    /// A newer refresh was issued while this one was in flight
    Superseded,
}

/// Owned application state for one user session
#[derive(Debug, Default)]
pub struct Session {
    log: RwLock<Arc<MeasurementLog>>,
    issued: AtomicU64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: MeasurementLog) -> Self {
        Self {
            log: RwLock::new(Arc::new(log)),
            issued: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<MeasurementLog>> {
        self.log.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<MeasurementLog>> {
        self.log.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Current log. Later refreshes do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<MeasurementLog> {
        let guard = self.read();
        Arc::clone(&*guard)
    }

    /// Start a refresh, superseding any refresh still in flight
    pub fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Install a fetched log if its ticket is still the latest issued
    pub fn install(&self, ticket: RefreshTicket, log: MeasurementLog) -> RefreshOutcome {
        let mut guard = self.write();
        let latest = self.issued.load(Ordering::SeqCst);
        if ticket.0 != latest {
            tracing::debug!(
                "Discarding stale refresh {} (latest is {})",
                ticket.0,
                latest
            );
            return RefreshOutcome::Superseded;
        }

        let entries = log.len();
        *guard = Arc::new(log);
        tracing::info!("Installed log with {} entries", entries);
        RefreshOutcome::Installed { entries }
    }

    /// Fetch the log from a source and swap it in.
    ///
    /// On error the current log is left untouched.
    pub async fn refresh<S: MeasurementSource>(&self, source: &S) -> Result<RefreshOutcome> {
        let ticket = self.begin_refresh();
        let log = source.fetch_log().await?;
        Ok(self.install(ticket, log))
    }

    /// Add a measurement to the in-memory log (copy-on-write)
    pub fn record(&self, measurement: Measurement) {
        let mut guard = self.write();
        let mut next = (**guard).clone();
        next.append(measurement);
        *guard = Arc::new(next);
    }

    /// Validate an entry, send it to the source, then add it locally
    pub async fn submit<S: MeasurementSource>(
        &self,
        source: &S,
        entry: &NewEntry,
    ) -> Result<Measurement> {
        let measurement = entry.validate()?;
        source.append_record(&entry.to_record()).await?;
        self.record(measurement.clone());
        Ok(measurement)
    }

    /// Dosing plan against the current snapshot
    pub fn plan(&self, request: &DoseRequest, params: &DosingParams) -> DosingPlan {
        estimate(request, &self.snapshot(), params)
    }
}
