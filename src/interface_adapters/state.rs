use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::entities::{ContentRecord, PinRecord, SessionGrant};
use crate::domain::pin::format_pin;
use crate::domain::ports::{Clock, PinSource, Slot};

const PIN_FILE: &str = "pin_record.json";
const CONTENT_FILE: &str = "content.json";

// Runtime knobs the handlers need when building use cases.
#[derive(Clone, Debug)]
pub struct GateSettings {
    pub session_ttl_ms: u64,
    pub share_base_url: String,
}

// Application state holding the three storage slots.
#[derive(Clone)]
pub struct AppState {
    // Persistent: survives restarts so consumed PINs stay consumed.
    pub pin_record: FallbackSlot<PinRecord>,
    // Session scope: never written to disk, so every start begins with no grant.
    pub grant: InMemorySlot<SessionGrant>,
    pub content: FallbackSlot<Vec<ContentRecord>>,
    pub settings: GateSettings,
    // Held across validate+consume.
    pub gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(data_dir: &Path, settings: GateSettings) -> Self {
        Self {
            pin_record: FallbackSlot::backed_by(FileSlot::new(data_dir.join(PIN_FILE))),
            grant: InMemorySlot::new(),
            content: FallbackSlot::backed_by(FileSlot::new(data_dir.join(CONTENT_FILE))),
            settings,
            gate: Arc::new(Mutex::new(())),
        }
    }

    // State with nothing on disk; used when no data dir is usable and in tests.
    pub fn in_memory(settings: GateSettings) -> Self {
        Self {
            pin_record: FallbackSlot::memory_only(),
            grant: InMemorySlot::new(),
            content: FallbackSlot::memory_only(),
            settings,
            gate: Arc::new(Mutex::new(())),
        }
    }
}

// In-memory slot adapter.
pub struct InMemorySlot<T> {
    value: Arc<Mutex<Option<T>>>,
}

impl<T> InMemorySlot<T> {
    pub fn new() -> Self {
        Self {
            value: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T> Default for InMemorySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InMemorySlot<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

#[async_trait]
impl<T> Slot<T> for InMemorySlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self) -> Result<Option<T>, String> {
        let value = self.value.lock().await;
        Ok(value.clone())
    }

    async fn set(&self, value: T) -> Result<(), String> {
        let mut slot = self.value.lock().await;
        *slot = Some(value);
        Ok(())
    }

    async fn clear(&self) -> Result<(), String> {
        let mut slot = self.value.lock().await;
        *slot = None;
        Ok(())
    }
}

// JSON file slot adapter. A missing file reads as an empty slot.
pub struct FileSlot<T> {
    path: PathBuf,
    _value: PhantomData<fn() -> T>,
}

impl<T> FileSlot<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _value: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Clone for FileSlot<T> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

#[async_trait]
impl<T> Slot<T> for FileSlot<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self) -> Result<Option<T>, String> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(format!("read {}: {err}", self.path.display())),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| format!("decode {}: {err}", self.path.display()))
    }

    async fn set(&self, value: T) -> Result<(), String> {
        let json = serde_json::to_vec_pretty(&value).map_err(|err| err.to_string())?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| format!("create {}: {err}", parent.display()))?;
        }

        // Write then rename so a crash never leaves a half-written slot.
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, json)
            .await
            .map_err(|err| format!("write {}: {err}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| format!("rename {}: {err}", self.path.display()))
    }

    async fn clear(&self) -> Result<(), String> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(format!("remove {}: {err}", self.path.display())),
        }
    }
}

// Persistent slot that degrades to memory. Disk failures are logged and the
// in-memory mirror answers instead, so callers never see a storage error.
//
// Once the file fails to read it is detached: its bytes are left as found and
// the rest of the run is served from memory only.
pub struct FallbackSlot<T> {
    primary: Option<FileSlot<T>>,
    mirror: InMemorySlot<T>,
    detached: Arc<AtomicBool>,
}

impl<T> FallbackSlot<T> {
    pub fn backed_by(primary: FileSlot<T>) -> Self {
        Self {
            primary: Some(primary),
            mirror: InMemorySlot::new(),
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn memory_only() -> Self {
        Self {
            primary: None,
            mirror: InMemorySlot::new(),
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn attached_primary(&self) -> Option<&FileSlot<T>> {
        if self.is_detached() {
            return None;
        }
        self.primary.as_ref()
    }
}

impl<T> Clone for FallbackSlot<T> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            mirror: self.mirror.clone(),
            detached: self.detached.clone(),
        }
    }
}

#[async_trait]
impl<T> Slot<T> for FallbackSlot<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self) -> Result<Option<T>, String> {
        let Some(primary) = self.attached_primary() else {
            return self.mirror.get().await;
        };

        match primary.get().await {
            Ok(Some(value)) => {
                self.mirror.set(value.clone()).await?;
                Ok(Some(value))
            }
            Ok(None) => self.mirror.get().await,
            Err(err) => {
                self.detached.store(true, Ordering::SeqCst);
                warn!(
                    path = %primary.path().display(),
                    error = %err,
                    "storage read failed; file left untouched, serving in-memory copy"
                );
                self.mirror.get().await
            }
        }
    }

    async fn set(&self, value: T) -> Result<(), String> {
        self.mirror.set(value.clone()).await?;
        if let Some(primary) = self.attached_primary() {
            if let Err(err) = primary.set(value).await {
                warn!(error = %err, "storage write failed; keeping in-memory copy");
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), String> {
        self.mirror.clear().await?;
        if let Some(primary) = self.attached_primary() {
            if let Err(err) = primary.clear().await {
                warn!(error = %err, "storage clear failed");
            }
        }
        Ok(())
    }
}

// System clock adapter used by access use cases.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

// Thread-local RNG backed PIN source.
#[derive(Clone)]
pub struct RandomPinSource;

impl PinSource for RandomPinSource {
    fn draw(&self) -> String {
        format_pin(rand::thread_rng().gen_range(0..1_000_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pin::is_well_formed;

    #[tokio::test]
    async fn when_file_is_missing_then_file_slot_reads_empty() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let slot = FileSlot::<PinRecord>::new(dir.path().join("missing.json"));

        let value = slot.get().await.expect("expected read to succeed");

        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn when_value_is_written_then_a_new_slot_on_the_same_file_reads_it_back() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let path = dir.path().join("nested").join(PIN_FILE);
        let mut record = PinRecord::new("111-222");
        record.used_pins.insert("000-001".to_string());

        FileSlot::<PinRecord>::new(path.clone())
            .set(record.clone())
            .await
            .expect("expected write to succeed");
        let reloaded = FileSlot::<PinRecord>::new(path)
            .get()
            .await
            .expect("expected read to succeed");

        assert_eq!(reloaded, Some(record));
    }

    #[tokio::test]
    async fn when_file_is_cleared_twice_then_both_calls_succeed() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let slot = FileSlot::<PinRecord>::new(dir.path().join(PIN_FILE));
        slot.set(PinRecord::new("111-222"))
            .await
            .expect("expected write to succeed");

        slot.clear().await.expect("expected first clear");
        slot.clear().await.expect("expected second clear");

        assert!(!slot.path().exists());
    }

    #[tokio::test]
    async fn when_file_is_corrupt_then_file_slot_reports_error_and_fallback_serves_memory() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let path = dir.path().join(PIN_FILE);
        std::fs::write(&path, "{ definitely not json").expect("expected seed write");

        let file_slot = FileSlot::<PinRecord>::new(path.clone());
        assert!(file_slot.get().await.is_err());

        let fallback = FallbackSlot::backed_by(FileSlot::<PinRecord>::new(path));
        let value = fallback.get().await.expect("expected fallback read to succeed");
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn when_file_is_unreadable_then_later_writes_leave_it_untouched() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let path = dir.path().join(PIN_FILE);
        let original = r#"{"active_pin":333444,"used_pins":["111-222","555-666"]}"#;
        std::fs::write(&path, original).expect("expected seed write");
        let slot = FallbackSlot::backed_by(FileSlot::<PinRecord>::new(path.clone()));

        assert_eq!(slot.get().await.expect("expected fallback read"), None);
        assert!(slot.is_detached());
        slot.set(PinRecord::new("777-888"))
            .await
            .expect("expected fallback write");
        slot.clear().await.expect("expected fallback clear");
        slot.set(PinRecord::new("999-000"))
            .await
            .expect("expected fallback write");

        let on_disk = std::fs::read_to_string(&path).expect("expected file to remain");
        assert_eq!(on_disk, original);
        assert_eq!(
            slot.get().await.expect("expected fallback read"),
            Some(PinRecord::new("999-000"))
        );
    }

    #[tokio::test]
    async fn when_file_is_readable_then_fallback_stays_attached() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let path = dir.path().join(PIN_FILE);
        let slot = FallbackSlot::backed_by(FileSlot::<PinRecord>::new(path.clone()));

        assert_eq!(slot.get().await.expect("expected read"), None);
        slot.set(PinRecord::new("111-222"))
            .await
            .expect("expected write");

        assert!(!slot.is_detached());
        let reloaded = FileSlot::<PinRecord>::new(path)
            .get()
            .await
            .expect("expected read");
        assert_eq!(reloaded, Some(PinRecord::new("111-222")));
    }

    #[tokio::test]
    async fn when_disk_write_fails_then_fallback_keeps_value_in_memory() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        // A regular file where a directory is expected makes every write fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").expect("expected seed write");
        let slot = FallbackSlot::backed_by(FileSlot::<PinRecord>::new(blocker.join(PIN_FILE)));

        slot.set(PinRecord::new("111-222"))
            .await
            .expect("expected fallback write to succeed");
        let value = slot.get().await.expect("expected fallback read to succeed");

        assert_eq!(value, Some(PinRecord::new("111-222")));
    }

    #[tokio::test]
    async fn when_memory_only_slot_is_cleared_then_it_reads_empty() {
        let slot = FallbackSlot::<Vec<ContentRecord>>::memory_only();
        slot.set(Vec::new()).await.expect("expected write");

        slot.clear().await.expect("expected clear");

        assert_eq!(slot.get().await.expect("expected read"), None);
    }

    #[test]
    fn when_random_pins_are_drawn_then_they_are_well_formed() {
        let source = RandomPinSource;

        for _ in 0..200 {
            assert!(is_well_formed(&source.draw()));
        }
    }
}
