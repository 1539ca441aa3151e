//! Placeholder sequencer backend, registered as `"dummy"`.

use async_trait::async_trait;
use mobject::{Backend, BackendArgs, BackendFactory};
use serde_json::Value;

pub const TYPE_NAME: &str = "dummy";

/// Sequencer with no state besides its configuration.
#[derive(Debug, Clone)]
pub struct DummySequencer {
    config: Value,
}

impl DummySequencer {
    pub fn new(config: Value) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    fn create(args: &BackendArgs<'_>) -> anyhow::Result<Box<dyn Backend>> {
        tracing::debug!(provider_id = args.provider_id, "Creating dummy sequencer");
        Ok(Box::new(Self::new(args.config.clone())))
    }

    // Nothing is persisted, so opening is the same as creating.
    fn open(args: &BackendArgs<'_>) -> anyhow::Result<Box<dyn Backend>> {
        tracing::debug!(provider_id = args.provider_id, "Opening dummy sequencer");
        Ok(Box::new(Self::new(args.config.clone())))
    }
}

#[async_trait]
impl Backend for DummySequencer {
    fn say_hello(&self) {
        tracing::info!("Hello World");
    }

    async fn compute_sum(&self, x: i32, y: i32) -> anyhow::Result<i32> {
        x.checked_add(y)
            .ok_or_else(|| anyhow::anyhow!("sum of {x} and {y} overflows a 32-bit integer"))
    }

    async fn destroy(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Add the `"dummy"` type to `factory`.
pub fn register(factory: &mut BackendFactory) {
    factory.register(TYPE_NAME, DummySequencer::create, DummySequencer::open);
}
