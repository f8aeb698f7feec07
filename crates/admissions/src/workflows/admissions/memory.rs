use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::domain::{ApplicationId, PoolKey, SeatId};
use super::ledger::Seat;
use super::store::{AdmissionStore, ApplicationRecord, RepositoryError, StoreTransaction};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-local store with optimistic units of work.
///
/// Every row carries a version. A unit of work reads rows under short shared locks, stages its
/// writes, and commits under a brief exclusive lock only if none of the rows it read moved in
/// the meantime; otherwise it runs again against fresh state. Units of work over disjoint rows
/// (different applications, different pools) never wait on each other, while two claims on the
/// same pool are serialized by the pool version.
pub struct InMemoryAdmissionStore {
    state: RwLock<StoreState>,
    lock_timeout: Duration,
}

/// Version-tracked row identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Application(ApplicationId),
    // Bumped by every seat write in the pool, so a pool scan sees any change to its seats.
    Pool(PoolKey),
    Seat(SeatId),
}

#[derive(Default)]
struct StoreState {
    applications: HashMap<ApplicationId, ApplicationRecord>,
    seats: BTreeMap<SeatId, Seat>,
    versions: HashMap<RowKey, u64>,
}

impl InMemoryAdmissionStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Bound how long a unit of work may wait or retry before failing as unavailable.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            lock_timeout,
        }
    }

    pub fn application_count(&self) -> usize {
        self.state.read().applications.len()
    }

    fn unavailable(&self) -> RepositoryError {
        RepositoryError::Unavailable(format!(
            "unit of work not committed within {}ms",
            self.lock_timeout.as_millis()
        ))
    }
}

impl Default for InMemoryAdmissionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionStore for InMemoryAdmissionStore {
    fn atomically<T, E, F>(&self, mut work: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            let mut transaction = MemoryTransaction {
                store: self,
                deadline,
                staged: Staged::default(),
                observed: RefCell::new(HashMap::new()),
            };
            let outcome = work(&mut transaction);
            let MemoryTransaction {
                staged, observed, ..
            } = transaction;
            let observed = observed.into_inner();

            match outcome {
                Ok(value) if !staged.is_empty() => {
                    let mut state = self
                        .state
                        .try_write_until(deadline)
                        .ok_or_else(|| self.unavailable())?;
                    if state.unchanged_since(&observed) {
                        state.apply(staged);
                        return Ok(value);
                    }
                }
                // Read-only work and failures are returned as-is once their reads still hold.
                outcome => {
                    let state = self
                        .state
                        .try_read_until(deadline)
                        .ok_or_else(|| self.unavailable())?;
                    if state.unchanged_since(&observed) {
                        return outcome;
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(self.unavailable().into());
            }
        }
    }
}

impl StoreState {
    fn version(&self, key: &RowKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: RowKey) {
        *self.versions.entry(key).or_insert(0) += 1;
    }

    fn unchanged_since(&self, observed: &HashMap<RowKey, u64>) -> bool {
        observed
            .iter()
            .all(|(key, version)| self.version(key) == *version)
    }

    fn apply(&mut self, staged: Staged) {
        for (id, record) in staged.applications {
            self.bump(RowKey::Application(id.clone()));
            self.applications.insert(id, record);
        }
        for (id, seat) in staged.seats {
            match seat {
                Some(seat) => {
                    self.bump(RowKey::Pool(seat.pool.clone()));
                    self.seats.insert(id.clone(), seat);
                }
                None => {
                    if let Some(removed) = self.seats.remove(&id) {
                        self.bump(RowKey::Pool(removed.pool));
                    }
                }
            }
            self.bump(RowKey::Seat(id));
        }
    }
}

#[derive(Default)]
struct Staged {
    applications: HashMap<ApplicationId, ApplicationRecord>,
    // `None` marks a staged removal.
    seats: BTreeMap<SeatId, Option<Seat>>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.seats.is_empty()
    }
}

struct MemoryTransaction<'a> {
    store: &'a InMemoryAdmissionStore,
    deadline: Instant,
    staged: Staged,
    /// First version seen for every row read; validated at commit.
    observed: RefCell<HashMap<RowKey, u64>>,
}

impl MemoryTransaction<'_> {
    /// Read committed state under a shared lock, noting the version of `key`.
    fn read<T>(
        &self,
        key: RowKey,
        read: impl FnOnce(&StoreState) -> T,
    ) -> Result<T, RepositoryError> {
        let state = self
            .store
            .state
            .try_read_until(self.deadline)
            .ok_or_else(|| self.store.unavailable())?;
        let version = state.version(&key);
        self.observed.borrow_mut().entry(key).or_insert(version);
        Ok(read(&state))
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn application(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        if let Some(staged) = self.staged.applications.get(id) {
            return Ok(Some(staged.clone()));
        }
        self.read(RowKey::Application(id.clone()), |state| {
            state.applications.get(id).cloned()
        })
    }

    fn insert_application(&mut self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        if self.application(&record.id)?.is_some() {
            return Err(RepositoryError::Conflict);
        }
        self.staged.applications.insert(record.id.clone(), record);
        Ok(())
    }

    fn update_application(&mut self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        if self.application(&record.id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.applications.insert(record.id.clone(), record);
        Ok(())
    }

    fn seats_in_pool(&self, pool: &PoolKey) -> Result<Vec<Seat>, RepositoryError> {
        let committed = self.read(RowKey::Pool(pool.clone()), |state| {
            state
                .seats
                .values()
                .filter(|seat| &seat.pool == pool)
                .cloned()
                .collect::<Vec<_>>()
        })?;

        let mut seats: Vec<Seat> = committed
            .into_iter()
            .filter(|seat| !self.staged.seats.contains_key(&seat.id))
            .chain(self.staged.seats.values().flatten().cloned())
            .filter(|seat| &seat.pool == pool)
            .collect();
        seats.sort_by_key(|seat| seat.ordinal);
        Ok(seats)
    }

    fn seat(&self, id: &SeatId) -> Result<Option<Seat>, RepositoryError> {
        match self.staged.seats.get(id) {
            Some(staged) => Ok(staged.clone()),
            None => self.read(RowKey::Seat(id.clone()), |state| state.seats.get(id).cloned()),
        }
    }

    fn put_seat(&mut self, seat: Seat) -> Result<(), RepositoryError> {
        self.staged.seats.insert(seat.id.clone(), Some(seat));
        Ok(())
    }

    fn remove_seat(&mut self, id: &SeatId) -> Result<(), RepositoryError> {
        if self.seat(id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.seats.insert(id.clone(), None);
        Ok(())
    }
}
