//! Ready-made collaborators: an in-memory store and a JSON file store.
//!
//! Both hold a [`Dataset`] and implement every collaborator trait. Routes are
//! committed all-or-nothing: the memory store swaps the day's routes under a
//! single lock, the file store writes a uniquely named temporary sibling and
//! persists it over the original.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use jiff::civil::Date;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::lock::LockFile;
use crate::models::{Coordinate, Delivery, DeliveryId, Driver, DriverId, Route, Vehicle, VehicleId};
use crate::traits::{CommitMode, DeliverySource, FleetSource, RouteStore};

/// Everything a planning run reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub depot: Option<Coordinate>,
    #[serde(default)]
    pub deliveries: Vec<Delivery>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub drivers: Vec<Driver>,
    #[serde(default)]
    pub routes: BTreeMap<Date, Vec<Route>>,
}

impl Dataset {
    fn pending_deliveries(&self, date: Date) -> Vec<Delivery> {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.scheduled_date == date)
            .cloned()
            .collect()
    }

    fn deliveries_by_ids(&self, ids: &[DeliveryId]) -> Result<Vec<Delivery>, StoreError> {
        select_by_ids(&self.deliveries, ids, "delivery", |delivery| delivery.id)
    }

    fn vehicles_by_ids(&self, ids: &[VehicleId]) -> Result<Vec<Vehicle>, StoreError> {
        select_by_ids(&self.vehicles, ids, "vehicle", |vehicle| vehicle.id)
    }

    fn drivers_by_ids(&self, ids: &[DriverId]) -> Result<Vec<Driver>, StoreError> {
        select_by_ids(&self.drivers, ids, "driver", |driver| driver.id)
    }

    fn has_routes(&self, date: Date) -> bool {
        self.routes.get(&date).is_some_and(|routes| !routes.is_empty())
    }

    fn apply_commit(&mut self, date: Date, routes: &[Route], mode: CommitMode) -> Result<(), StoreError> {
        if mode == CommitMode::Insert && self.has_routes(date) {
            return Err(StoreError::AlreadyPlanned(date));
        }
        self.routes.insert(date, routes.to_vec());
        Ok(())
    }
}

fn select_by_ids<T, I>(items: &[T], ids: &[I], kind: &'static str, id_of: impl Fn(&T) -> I) -> Result<Vec<T>, StoreError>
where
    T: Clone,
    I: PartialEq + Copy + Into<u64>,
{
    ids.iter()
        .map(|&id| {
            items
                .iter()
                .find(|item| id_of(item) == id)
                .cloned()
                .ok_or(StoreError::UnknownId { kind, id: id.into() })
        })
        .collect()
}

fn check_deadline(deadline: Instant) -> Result<(), StoreError> {
    if Instant::now() > deadline {
        Err(StoreError::DeadlineExceeded)
    } else {
        Ok(())
    }
}

/// In-process store, also used as the test double for every collaborator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dataset: Mutex<Dataset>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Mutex::new(dataset),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Makes every following commit fail with [`StoreError::Unavailable`].
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn routes_for(&self, date: Date) -> Vec<Route> {
        self.dataset.lock().routes.get(&date).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> Dataset {
        self.dataset.lock().clone()
    }
}

impl DeliverySource for MemoryStore {
    fn pending_deliveries(&self, date: Date) -> Result<Vec<Delivery>, StoreError> {
        Ok(self.dataset.lock().pending_deliveries(date))
    }

    fn deliveries_by_ids(&self, ids: &[DeliveryId]) -> Result<Vec<Delivery>, StoreError> {
        self.dataset.lock().deliveries_by_ids(ids)
    }
}

impl FleetSource for MemoryStore {
    fn vehicles(&self, _date: Date) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self.dataset.lock().vehicles.clone())
    }

    fn drivers(&self, _date: Date) -> Result<Vec<Driver>, StoreError> {
        Ok(self.dataset.lock().drivers.clone())
    }

    fn vehicles_by_ids(&self, ids: &[VehicleId]) -> Result<Vec<Vehicle>, StoreError> {
        self.dataset.lock().vehicles_by_ids(ids)
    }

    fn drivers_by_ids(&self, ids: &[DriverId]) -> Result<Vec<Driver>, StoreError> {
        self.dataset.lock().drivers_by_ids(ids)
    }
}

impl RouteStore for MemoryStore {
    fn has_routes(&self, date: Date) -> Result<bool, StoreError> {
        Ok(self.dataset.lock().has_routes(date))
    }

    fn commit_routes(&self, date: Date, routes: &[Route], mode: CommitMode, deadline: Instant) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }
        check_deadline(deadline)?;
        self.dataset.lock().apply_commit(date, routes, mode)?;
        debug!(%date, routes = routes.len(), "committed routes in memory");
        Ok(())
    }
}

const WRITE_RETRY: Duration = Duration::from_millis(5);

/// Store backed by a single JSON document on disk.
///
/// Every read loads the file fresh; commits rewrite it atomically. Several
/// processes may share one file: planning dates and writes are serialized
/// with lock files next to it (`<file>.<date>.lock`, `<file>.write.lock`).
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        // Fail early on a missing or malformed file.
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Dataset, StoreError> {
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn depot(&self) -> Result<Option<Coordinate>, StoreError> {
        Ok(self.load()?.depot)
    }

    /// Lock file guarding planning runs for `date`.
    pub fn date_lock_path(&self, date: Date) -> PathBuf {
        self.sibling(&format!("{date}.lock"))
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.file_name().unwrap_or_default());
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Waits for the dataset-wide write lock until `deadline`.
    fn lock_writes(&self, deadline: Instant) -> Result<LockFile, StoreError> {
        let path = self.sibling("write.lock");
        loop {
            if let Some(lock) = LockFile::try_acquire(&path)? {
                return Ok(lock);
            }
            check_deadline(deadline)?;
            thread::sleep(WRITE_RETRY);
        }
    }

    /// Writes a fresh temporary file beside the dataset and moves it over the
    /// original. The temporary file is removed if any step fails.
    fn write(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(self.dir())?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, dataset)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }
}

impl DeliverySource for JsonFileStore {
    fn pending_deliveries(&self, date: Date) -> Result<Vec<Delivery>, StoreError> {
        Ok(self.load()?.pending_deliveries(date))
    }

    fn deliveries_by_ids(&self, ids: &[DeliveryId]) -> Result<Vec<Delivery>, StoreError> {
        self.load()?.deliveries_by_ids(ids)
    }
}

impl FleetSource for JsonFileStore {
    fn vehicles(&self, _date: Date) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self.load()?.vehicles)
    }

    fn drivers(&self, _date: Date) -> Result<Vec<Driver>, StoreError> {
        Ok(self.load()?.drivers)
    }

    fn vehicles_by_ids(&self, ids: &[VehicleId]) -> Result<Vec<Vehicle>, StoreError> {
        self.load()?.vehicles_by_ids(ids)
    }

    fn drivers_by_ids(&self, ids: &[DriverId]) -> Result<Vec<Driver>, StoreError> {
        self.load()?.drivers_by_ids(ids)
    }
}

impl RouteStore for JsonFileStore {
    fn has_routes(&self, date: Date) -> Result<bool, StoreError> {
        Ok(self.load()?.has_routes(date))
    }

    fn commit_routes(&self, date: Date, routes: &[Route], mode: CommitMode, deadline: Instant) -> Result<(), StoreError> {
        let _write_lock = self.lock_writes(deadline)?;
        let mut dataset = self.load()?;
        dataset.apply_commit(date, routes, mode)?;
        check_deadline(deadline)?;
        self.write(&dataset)?;
        info!(%date, routes = routes.len(), path = %self.path.display(), "committed routes to file");
        Ok(())
    }

    fn lock_date(&self, date: Date) -> Result<Option<LockFile>, StoreError> {
        match LockFile::try_acquire(self.date_lock_path(date))? {
            Some(lock) => Ok(Some(lock)),
            None => Err(StoreError::Locked(date)),
        }
    }
}
