#![allow(dead_code)]

use async_trait::async_trait;
use channel_router::application::engine::{ChannelRouter, RouterPorts};
use channel_router::config::EngineConfig;
use channel_router::domain::endpoint::Endpoint;
use channel_router::domain::evidence::LocalFile;
use channel_router::domain::ports::UploadService;
use channel_router::error::ServiceError;
use channel_router::infrastructure::in_memory::{
    InMemoryEndpointDirectory, InMemoryPreviewRenderer, InMemorySessionFlags,
};
use channel_router::infrastructure::simulated::SimulatedOrderService;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Uploader whose calls block until the test hands out permits.
///
/// Files whose name contains `corrupt` fail once released.
#[derive(Clone)]
pub struct GatedUploader {
    pub gate: Arc<Semaphore>,
    pub calls: Arc<AtomicUsize>,
}

impl GatedUploader {
    pub fn closed() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open() -> Self {
        let uploader = Self::closed();
        uploader.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        uploader
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadService for GatedUploader {
    async fn upload(&self, file: &LocalFile) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ServiceError::network(e.to_string()))?;
        permit.forget();
        let name = file.path.display().to_string();
        if name.contains("corrupt") {
            return Err(ServiceError::rejected(format!("cannot decode {name}")));
        }
        Ok(format!("https://cdn.example{name}"))
    }
}

pub fn files(names: &[&str]) -> Vec<LocalFile> {
    names.iter().map(|n| LocalFile::new(format!("/{n}"))).collect()
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        retry_delay_ms: 50,
        ..Default::default()
    }
}

pub fn build_router(
    config: EngineConfig,
    endpoints: Vec<Endpoint>,
    service: SimulatedOrderService,
    uploader: GatedUploader,
    seed: u64,
) -> ChannelRouter {
    build_router_with_flags(config, endpoints, service, uploader, InMemorySessionFlags::new(), seed)
}

/// Like [`build_router`], with session flags the test can inspect.
pub fn build_router_with_flags(
    config: EngineConfig,
    endpoints: Vec<Endpoint>,
    service: SimulatedOrderService,
    uploader: GatedUploader,
    flags: InMemorySessionFlags,
    seed: u64,
) -> ChannelRouter {
    ChannelRouter::new(
        config,
        RouterPorts {
            directory: Box::new(InMemoryEndpointDirectory::new(endpoints)),
            orders: Box::new(service),
            uploads: Arc::new(uploader),
            previews: Box::new(InMemoryPreviewRenderer::new()),
            flags: Box::new(flags),
        },
    )
    .unwrap()
    .with_rng(StdRng::seed_from_u64(seed))
}
