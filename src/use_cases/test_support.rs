use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::pin::format_pin;
use crate::domain::ports::{Clock, PinSource, Slot};

// Shared fixed time source for deterministic use-case tests.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_epoch_millis(&self) -> u64 {
        self.0
    }
}

// Time source that tests move forward between calls.
#[derive(Clone)]
pub(crate) struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub(crate) fn at(now: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    pub(crate) fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// Hands out scripted PINs, then a deterministic tail once the script runs out.
pub(crate) struct ScriptedPins {
    script: Mutex<VecDeque<String>>,
    tail: AtomicU32,
}

impl ScriptedPins {
    pub(crate) fn new<I, S>(pins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(pins.into_iter().map(Into::into).collect()),
            tail: AtomicU32::new(900_000),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl PinSource for ScriptedPins {
    fn draw(&self) -> String {
        let mut script = self.script.lock().expect("script mutex poisoned");
        script
            .pop_front()
            .unwrap_or_else(|| format_pin(self.tail.fetch_add(1, Ordering::SeqCst)))
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub get: bool,
    pub set: bool,
    pub clear: bool,
}

// In-memory slot that tests can seed, inspect, and break on purpose.
#[derive(Clone)]
pub(crate) struct RecordingSlot<T> {
    value: Arc<Mutex<Option<T>>>,
    failures: FailureFlags,
}

impl<T> RecordingSlot<T>
where
    T: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            value: Arc::new(Mutex::new(None)),
            failures: FailureFlags::default(),
        }
    }

    pub(crate) fn seeded(value: T) -> Self {
        let slot = Self::new();
        slot.insert_test_value(value);
        slot
    }

    pub(crate) fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub(crate) fn insert_test_value(&self, value: T) {
        let mut guard = self.value.lock().expect("slot mutex poisoned");
        *guard = Some(value);
    }

    pub(crate) fn get_test_value(&self) -> Option<T> {
        let guard = self.value.lock().expect("slot mutex poisoned");
        guard.clone()
    }
}

#[async_trait]
impl<T> Slot<T> for RecordingSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self) -> Result<Option<T>, String> {
        if self.failures.get {
            return Err("get failed".to_string());
        }

        let guard = self.value.lock().expect("slot mutex poisoned");
        Ok(guard.clone())
    }

    async fn set(&self, value: T) -> Result<(), String> {
        if self.failures.set {
            return Err("set failed".to_string());
        }

        let mut guard = self.value.lock().expect("slot mutex poisoned");
        *guard = Some(value);
        Ok(())
    }

    async fn clear(&self) -> Result<(), String> {
        if self.failures.clear {
            return Err("clear failed".to_string());
        }

        let mut guard = self.value.lock().expect("slot mutex poisoned");
        *guard = None;
        Ok(())
    }
}
