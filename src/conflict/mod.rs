//! In-process conflict detection for overlapping promotions.
//!
//! Tracks the path sets of promotions currently transferring into each
//! target repository. A new promotion whose paths intersect an in-flight
//! set for the same target is refused. Admission is advisory and limited to
//! this process; deployments running several instances need an external
//! lock.
//!
//! The mutex is held only to register and deregister a path set, never
//! while the transfer itself runs, so a long transfer cannot block conflict
//! checks for unrelated promotions.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::model::StoreKey;

/// A path set registered for the duration of one promotion attempt.
#[derive(Debug)]
struct InFlightPathSet {
    id: u64,
    paths: BTreeSet<String>,
}

type InFlightMap = HashMap<StoreKey, Vec<InFlightPathSet>>;

/// Details handed to the conflict branch of [`ConflictGuard::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub target: StoreKey,
    /// Requested paths already being promoted by another attempt.
    pub overlapping: BTreeSet<String>,
}

impl Conflict {
    pub fn describe(&self) -> String {
        let paths: Vec<&str> = self.overlapping.iter().map(String::as_str).collect();
        format!(
            "Conflict detected: another promotion into {} is in progress for paths: {}",
            self.target,
            paths.join(", ")
        )
    }
}

/// Mutual exclusion for overlapping path sets per target repository.
#[derive(Default)]
pub struct ConflictGuard {
    in_flight: Arc<Mutex<InFlightMap>>,
    next_id: AtomicU64,
}

/// Removes a registration when the guarded work ends, however it ends.
struct Registration {
    in_flight: Arc<Mutex<InFlightMap>>,
    target: StoreKey,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut map = lock(&self.in_flight);
        if let Some(sets) = map.get_mut(&self.target) {
            sets.retain(|set| set.id != self.id);
            if sets.is_empty() {
                map.remove(&self.target);
            }
        }
        debug!(target = %self.target, id = self.id, "Released in-flight paths");
    }
}

fn lock(map: &Mutex<InFlightMap>) -> MutexGuard<'_, InFlightMap> {
    // Registration bookkeeping stays consistent even if a holder panicked.
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConflictGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_proceed` with exclusive use of `paths` in `target`, or
    /// `on_conflict` if another in-flight attempt overlaps them.
    pub async fn admit<T, P, Fut, C>(
        &self,
        target: &StoreKey,
        paths: &BTreeSet<String>,
        on_proceed: P,
        on_conflict: C,
    ) -> T
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        C: FnOnce(Conflict) -> T,
    {
        let registration = match self.register(target, paths) {
            Ok(registration) => registration,
            Err(conflict) => {
                info!(
                    target = %target,
                    overlapping = conflict.overlapping.len(),
                    "Promotion conflicts with in-flight promotion"
                );
                return on_conflict(conflict);
            }
        };

        let outcome = on_proceed().await;
        drop(registration);
        outcome
    }

    /// Number of targets with at least one in-flight path set.
    pub fn in_flight_targets(&self) -> usize {
        lock(&self.in_flight).len()
    }

    fn register(
        &self,
        target: &StoreKey,
        paths: &BTreeSet<String>,
    ) -> Result<Registration, Conflict> {
        let mut map = lock(&self.in_flight);

        if let Some(sets) = map.get(target) {
            let overlapping: BTreeSet<String> = sets
                .iter()
                .flat_map(|set| set.paths.intersection(paths))
                .cloned()
                .collect();
            if !overlapping.is_empty() {
                return Err(Conflict {
                    target: target.clone(),
                    overlapping,
                });
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        map.entry(target.clone()).or_default().push(InFlightPathSet {
            id,
            paths: paths.clone(),
        });
        debug!(target = %target, id, paths = paths.len(), "Registered in-flight paths");

        Ok(Registration {
            in_flight: Arc::clone(&self.in_flight),
            target: target.clone(),
            id,
        })
    }
}
