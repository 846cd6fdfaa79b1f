use async_trait::async_trait;

// Port for one logical storage slot (get/set/clear).
#[async_trait]
pub trait Slot<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn get(&self) -> Result<Option<T>, String>;
    async fn set(&self, value: T) -> Result<(), String>;
    async fn clear(&self) -> Result<(), String>;
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_millis(&self) -> u64;
}

// Port for drawing candidate PINs.
pub trait PinSource: Send + Sync {
    fn draw(&self) -> String;
}
