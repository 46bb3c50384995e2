use crate::domain::endpoint::Endpoint;
use crate::domain::evidence::{LocalFile, PreviewHandle};
use crate::domain::method::PaymentMethod;
use crate::domain::ports::{EndpointDirectory, PreviewRenderer, SessionFlags};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Session flags held in process memory; gone when the session is dropped.
#[derive(Default, Clone)]
pub struct InMemorySessionFlags {
    matched: Arc<RwLock<HashSet<PaymentMethod>>>,
}

impl InMemorySessionFlags {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionFlags for InMemorySessionFlags {
    async fn get(&self, method: PaymentMethod) -> bool {
        self.matched.read().await.contains(&method)
    }

    async fn set(&self, method: PaymentMethod) {
        self.matched.write().await.insert(method);
    }

    async fn clear(&self) {
        self.matched.write().await.clear();
    }
}

/// A fixed endpoint list.
#[derive(Default, Clone)]
pub struct InMemoryEndpointDirectory {
    endpoints: Arc<Vec<Endpoint>>,
}

impl InMemoryEndpointDirectory {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
        }
    }
}

#[async_trait]
impl EndpointDirectory for InMemoryEndpointDirectory {
    async fn list(&self, method: Option<PaymentMethod>) -> Result<Vec<Endpoint>> {
        Ok(self
            .endpoints
            .iter()
            .filter(|e| method.is_none_or(|m| e.method == m))
            .cloned()
            .collect())
    }
}

/// Hands out numbered preview handles and keeps count of what is still live.
///
/// Releasing a handle that is not live is recorded as a double release.
#[derive(Default, Clone)]
pub struct InMemoryPreviewRenderer {
    next: Arc<AtomicU64>,
    live: Arc<Mutex<HashSet<u64>>>,
    released: Arc<AtomicUsize>,
    double_releases: Arc<AtomicUsize>,
}

impl InMemoryPreviewRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.next.load(Ordering::SeqCst) as usize
    }

    pub fn live(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or_default()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn double_releases(&self) -> usize {
        self.double_releases.load(Ordering::SeqCst)
    }
}

impl PreviewRenderer for InMemoryPreviewRenderer {
    fn create(&self, file: &LocalFile) -> PreviewHandle {
        let raw = self.next.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut live) = self.live.lock() {
            live.insert(raw);
        }
        tracing::trace!(handle = raw, path = %file.path.display(), "preview created");
        PreviewHandle::new(raw)
    }

    fn release(&self, handle: PreviewHandle) {
        let was_live = self
            .live
            .lock()
            .map(|mut live| live.remove(&handle.raw()))
            .unwrap_or(false);
        if was_live {
            self.released.fetch_add(1, Ordering::SeqCst);
        } else {
            self.double_releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_flags() {
        let flags = InMemorySessionFlags::new();
        assert!(!flags.get(PaymentMethod::Wechat).await);
        flags.set(PaymentMethod::Wechat).await;
        assert!(flags.get(PaymentMethod::Wechat).await);
        assert!(!flags.get(PaymentMethod::Alipay).await);
        flags.clear().await;
        assert!(!flags.get(PaymentMethod::Wechat).await);
    }

    #[tokio::test]
    async fn test_directory_filters_by_method() {
        let directory = InMemoryEndpointDirectory::new(vec![
            Endpoint::new("w", PaymentMethod::Wechat, 1),
            Endpoint::new("a", PaymentMethod::Alipay, 1),
        ]);
        assert_eq!(directory.list(None).await.unwrap().len(), 2);
        let wechat = directory.list(Some(PaymentMethod::Wechat)).await.unwrap();
        assert_eq!(wechat.len(), 1);
        assert_eq!(wechat[0].id.as_str(), "w");
    }

    #[test]
    fn test_preview_release_accounting() {
        let renderer = InMemoryPreviewRenderer::new();
        let file = LocalFile::new("/tmp/a.jpg");
        let a = renderer.create(&file);
        let b = renderer.create(&file);
        assert_eq!(renderer.live(), 2);
        renderer.release(a);
        assert_eq!(renderer.live(), 1);
        // A forged handle with a released number counts as a double release.
        renderer.release(PreviewHandle::new(0));
        renderer.release(b);
        assert_eq!(renderer.released(), 2);
        assert_eq!(renderer.double_releases(), 1);
    }
}
