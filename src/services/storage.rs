use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

use crate::{
    error::AppError,
    models::{summary::SummaryMap, trip::Trip},
    services::snapshots::{RefPath, Snapshot, SnapshotHub, Subscription},
};

const TRIPS_FILE: &str = "trips.json";
const SUMMARIES_FILE: &str = "summaries.json";

/// Per-user JSON documents under `<root>/users/<uuid>/`.
#[derive(Clone)]
pub struct StorageService {
    root: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
    hub: SnapshotHub,
}

impl StorageService {
    pub fn new(root: PathBuf, hub: SnapshotHub) -> Self {
        Self {
            root: Arc::new(root),
            write_lock: Arc::new(Mutex::new(())),
            hub,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hub(&self) -> &SnapshotHub {
        &self.hub
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root().join("users")).await?;
        Ok(())
    }

    pub fn user_dir(&self, user_uuid: &str) -> PathBuf {
        self.root().join("users").join(user_uuid)
    }

    async fn ensure_user_dir(&self, user_uuid: &str) -> Result<PathBuf, AppError> {
        let dir = self.user_dir(user_uuid);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn read_document<T>(&self, user_uuid: &str, filename: &str) -> Result<T, AppError>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.user_dir(user_uuid).join(filename);
        if !fs::try_exists(&path).await? {
            return Ok(T::default());
        }
        let raw = fs::read(&path).await?;
        if raw.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write_document<T>(
        &self,
        user_uuid: &str,
        filename: &str,
        value: &T,
    ) -> Result<(), AppError>
    where
        T: Serialize + ?Sized,
    {
        let dir = self.ensure_user_dir(user_uuid).await?;
        let path = dir.join(filename);
        let tmp = dir.join(format!("{filename}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(value)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn load_user_trips(&self, user_uuid: &str) -> Result<Vec<Trip>, AppError> {
        self.read_document(user_uuid, TRIPS_FILE).await
    }

    pub async fn find_trip(&self, user_uuid: &str, trip_id: &str) -> Result<Trip, AppError> {
        self.load_user_trips(user_uuid)
            .await?
            .into_iter()
            .find(|trip| trip.id == trip_id)
            .ok_or(AppError::NotFound)
    }

    async fn commit_trips(&self, user_uuid: &str, trips: Vec<Trip>) -> Result<(), AppError> {
        self.write_document(user_uuid, TRIPS_FILE, &trips).await?;
        let path = RefPath::trips(user_uuid);
        let delivered = self.hub.publish(&path, &Snapshot::Trips(trips));
        debug!(%path, delivered, "trips snapshot published");
        Ok(())
    }

    pub async fn insert_trip(&self, trip: Trip) -> Result<Trip, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut trips = self.load_user_trips(&trip.user_uuid).await?;
        if trips.iter().any(|existing| existing.id == trip.id) {
            return Err(AppError::bad_request("A trip with this id already exists."));
        }
        trips.push(trip.clone());
        self.commit_trips(&trip.user_uuid, trips).await?;
        Ok(trip)
    }

    pub async fn update_trip(&self, trip: Trip) -> Result<Trip, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut trips = self.load_user_trips(&trip.user_uuid).await?;
        let slot = trips
            .iter_mut()
            .find(|existing| existing.id == trip.id)
            .ok_or(AppError::NotFound)?;
        *slot = trip.clone();
        self.commit_trips(&trip.user_uuid, trips).await?;
        Ok(trip)
    }

    pub async fn delete_trip(&self, user_uuid: &str, trip_id: &str) -> Result<Trip, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut trips = self.load_user_trips(user_uuid).await?;
        let index = trips
            .iter()
            .position(|trip| trip.id == trip_id)
            .ok_or(AppError::NotFound)?;
        let removed = trips.remove(index);
        self.commit_trips(user_uuid, trips).await?;
        Ok(removed)
    }

    pub async fn load_summaries(&self, user_uuid: &str) -> Result<SummaryMap, AppError> {
        self.read_document(user_uuid, SUMMARIES_FILE).await
    }

    pub async fn load_summary(
        &self,
        user_uuid: &str,
        year: &str,
    ) -> Result<Option<String>, AppError> {
        Ok(self.load_summaries(user_uuid).await?.remove(year))
    }

    async fn commit_summaries(&self, user_uuid: &str, map: SummaryMap) -> Result<(), AppError> {
        self.write_document(user_uuid, SUMMARIES_FILE, &map).await?;
        let path = RefPath::summaries(user_uuid);
        let delivered = self.hub.publish(&path, &Snapshot::Summaries(map));
        debug!(%path, delivered, "summaries snapshot published");
        Ok(())
    }

    pub async fn set_summary(
        &self,
        user_uuid: &str,
        year: &str,
        text: &str,
    ) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_summaries(user_uuid).await?;
        map.insert(year.to_string(), text.to_string());
        self.commit_summaries(user_uuid, map).await
    }

    pub async fn delete_summary(&self, user_uuid: &str, year: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_summaries(user_uuid).await?;
        if map.remove(year).is_none() {
            return Err(AppError::NotFound);
        }
        self.commit_summaries(user_uuid, map).await
    }

    pub async fn remove_user_data(&self, user_uuid: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let dir = self.user_dir(user_uuid);
        if fs::try_exists(&dir).await? {
            fs::remove_dir_all(&dir).await?;
        } else {
            warn!(user_uuid, "no stored documents to remove");
        }
        self.hub.cancel(&RefPath::trips(user_uuid));
        self.hub.cancel(&RefPath::summaries(user_uuid));
        Ok(())
    }

    /// Registers `callback` on the user's trips, then hands it the current list once.
    /// Writers are held off until that first delivery, so it is never older than a
    /// later publish.
    pub async fn subscribe_trips<F>(
        &self,
        user_uuid: &str,
        callback: F,
    ) -> Result<Subscription, AppError>
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let callback = Arc::new(callback);
        let listener = callback.clone();
        let subscription = self
            .hub
            .on_snapshot(RefPath::trips(user_uuid), move |snapshot| listener(snapshot));
        let current = self.load_user_trips(user_uuid).await?;
        callback(&Snapshot::Trips(current));
        Ok(subscription)
    }

    pub async fn subscribe_summaries<F>(
        &self,
        user_uuid: &str,
        callback: F,
    ) -> Result<Subscription, AppError>
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let callback = Arc::new(callback);
        let listener = callback.clone();
        let subscription = self
            .hub
            .on_snapshot(RefPath::summaries(user_uuid), move |snapshot| listener(snapshot));
        let current = self.load_summaries(user_uuid).await?;
        callback(&Snapshot::Summaries(current));
        Ok(subscription)
    }
}
