#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mobject::{
    Admin, Backend, BackendFactory, Client, Engine, LocalNetwork, Provider, ProviderHost,
    ProviderOptions, TeardownPolicy,
};

pub const ADDRESS: &str = "local://provider";
pub const PROVIDER_ID: u16 = 0;

#[derive(Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub opened: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub sums: AtomicUsize,
}

impl Counters {
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Backend that records how it was used.
pub struct Recording {
    counters: Arc<Counters>,
}

#[async_trait]
impl Backend for Recording {
    fn say_hello(&self) {
        tracing::info!("Hello World");
    }

    async fn compute_sum(&self, x: i32, y: i32) -> anyhow::Result<i32> {
        // Give racing requests a chance to interleave.
        tokio::task::yield_now().await;
        self.counters.sums.fetch_add(1, Ordering::SeqCst);
        x.checked_add(y)
            .ok_or_else(|| anyhow::anyhow!("overflow"))
    }

    async fn destroy(&self) -> anyhow::Result<bool> {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Backend whose `destroy` takes a while before it counts.
pub struct SlowDestroy {
    counters: Arc<Counters>,
}

pub const SLOW_DESTROY_DELAY: Duration = Duration::from_millis(300);

#[async_trait]
impl Backend for SlowDestroy {
    fn say_hello(&self) {}

    async fn compute_sum(&self, x: i32, y: i32) -> anyhow::Result<i32> {
        Ok(x + y)
    }

    async fn destroy(&self) -> anyhow::Result<bool> {
        tokio::time::sleep(SLOW_DESTROY_DELAY).await;
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

pub fn factory(counters: &Arc<Counters>) -> BackendFactory {
    let mut factory = BackendFactory::new();
    let c_create = counters.clone();
    let c_open = counters.clone();
    factory.register(
        "recording",
        move |_| {
            c_create.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Recording {
                counters: c_create.clone(),
            }) as Box<dyn Backend>)
        },
        move |_| {
            c_open.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Recording {
                counters: c_open.clone(),
            }) as Box<dyn Backend>)
        },
    );
    factory.register(
        "needs_path",
        |args| {
            let path = args
                .config
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("missing \"path\" in configuration"))?;
            anyhow::bail!("cannot create sequencer at {path}")
        },
        |_| anyhow::bail!("nothing to open"),
    );
    let c_slow = counters.clone();
    let c_slow_open = counters.clone();
    factory.register(
        "slow_destroy",
        move |_| {
            Ok(Box::new(SlowDestroy {
                counters: c_slow.clone(),
            }) as Box<dyn Backend>)
        },
        move |_| {
            Ok(Box::new(SlowDestroy {
                counters: c_slow_open.clone(),
            }) as Box<dyn Backend>)
        },
    );
    factory
}

/// One in-process provider plus an admin and a client pointed at it.
pub struct Fixture {
    pub host: Arc<ProviderHost>,
    pub provider: Arc<Provider>,
    pub counters: Arc<Counters>,
    pub admin: Admin,
    pub client: Client,
}

pub fn fixture(token: &str) -> Fixture {
    fixture_with(token, TeardownPolicy::Detach)
}

pub fn fixture_with(token: &str, teardown: TeardownPolicy) -> Fixture {
    let counters = Arc::new(Counters::default());
    let provider = Arc::new(Provider::new(
        ProviderOptions {
            provider_id: PROVIDER_ID,
            token: token.to_string(),
            teardown,
        },
        Arc::new(factory(&counters)),
    ));

    let host = Arc::new(ProviderHost::new(ADDRESS));
    host.register_provider(provider.clone())
        .expect("fresh host accepts the provider");

    let network = LocalNetwork::new();
    network.bind(host.clone());
    let engine = Engine::with_local(network);

    Fixture {
        host,
        provider,
        counters,
        admin: Admin::new(engine.clone()),
        client: Client::new(engine),
    }
}
