//! Shared fixtures for huddle-crypto integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::executor::block_on;
use huddle_crypto::config::EngineConfig;
use huddle_crypto::identity::Identity;
use huddle_crypto::provider::{
    KeyFormat, KeyHandle, KeyPair, KeyUsage, NativeProvider, PrimitiveProvider, ProviderError,
};
use huddle_crypto::roster::RosterSnapshot;
use huddle_crypto::session::Session;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Returns `Pending` once, then `Ready`.
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Delegates to `NativeProvider`, with hooks to observe concurrency, record
/// generated key material, and inject failures.
#[derive(Default)]
pub struct TestProvider {
    inner: NativeProvider,
    pub suspend: AtomicBool,
    pub fail_key_pair: AtomicBool,
    pub fail_verify: AtomicBool,
    fail_wrap_for: Mutex<Option<Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    wraps: AtomicUsize,
    generated: Mutex<Vec<Vec<u8>>>,
}

impl TestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield once inside every async operation.
    pub fn suspending() -> Self {
        let provider = Self::default();
        provider.suspend.store(true, Ordering::SeqCst);
        provider
    }

    /// Make every wrap to this public key fail.
    pub fn fail_wraps_to(&self, public_key: &KeyHandle) {
        *self.fail_wrap_for.lock().unwrap() = Some(public_key.material().to_vec());
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn wrap_count(&self) -> usize {
        self.wraps.load(Ordering::SeqCst)
    }

    /// Raw material of every symmetric and signing key generated so far.
    pub fn generated_keys(&self) -> Vec<Vec<u8>> {
        self.generated.lock().unwrap().clone()
    }

    async fn maybe_suspend(&self) {
        if self.suspend.load(Ordering::SeqCst) {
            YieldNow(false).await;
        }
    }

    fn record(&self, key: &KeyHandle) {
        self.generated.lock().unwrap().push(key.material().to_vec());
    }
}

#[async_trait]
impl PrimitiveProvider for TestProvider {
    async fn generate_key_pair(&self) -> Result<KeyPair, ProviderError> {
        self.maybe_suspend().await;
        if self.fail_key_pair.load(Ordering::SeqCst) {
            return Err(ProviderError::InvalidKey("key pair generation disabled".into()));
        }
        self.inner.generate_key_pair().await
    }

    async fn generate_symmetric_key(&self) -> Result<KeyHandle, ProviderError> {
        self.maybe_suspend().await;
        let key = self.inner.generate_symmetric_key().await?;
        self.record(&key);
        Ok(key)
    }

    async fn generate_signing_key(&self) -> Result<KeyHandle, ProviderError> {
        self.maybe_suspend().await;
        let key = self.inner.generate_signing_key().await?;
        self.record(&key);
        Ok(key)
    }

    async fn export_key(
        &self,
        key: &KeyHandle,
        format: KeyFormat,
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError> {
        self.inner.export_key(key, format).await
    }

    async fn import_key(
        &self,
        bytes: &[u8],
        format: KeyFormat,
        usage: KeyUsage,
    ) -> Result<KeyHandle, ProviderError> {
        self.inner.import_key(bytes, format, usage).await
    }

    async fn asymmetric_wrap(
        &self,
        bytes: &[u8],
        public_key: &KeyHandle,
    ) -> Result<Vec<u8>, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.maybe_suspend().await;

        let victim = self.fail_wrap_for.lock().unwrap().clone();
        let result = if victim.as_deref() == Some(public_key.material()) {
            Err(ProviderError::Encryption("injected wrap failure".into()))
        } else {
            self.inner.asymmetric_wrap(bytes, public_key).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.wraps.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn asymmetric_unwrap(
        &self,
        bytes: &[u8],
        private_key: &KeyHandle,
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError> {
        self.maybe_suspend().await;
        self.inner.asymmetric_unwrap(bytes, private_key).await
    }

    async fn symmetric_encrypt(
        &self,
        bytes: &[u8],
        key: &KeyHandle,
        iv: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        self.maybe_suspend().await;
        self.inner.symmetric_encrypt(bytes, key, iv).await
    }

    async fn symmetric_decrypt(
        &self,
        bytes: &[u8],
        key: &KeyHandle,
        iv: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        self.maybe_suspend().await;
        self.inner.symmetric_decrypt(bytes, key, iv).await
    }

    async fn sign(&self, bytes: &[u8], signing_key: &KeyHandle) -> Result<Vec<u8>, ProviderError> {
        self.inner.sign(bytes, signing_key).await
    }

    async fn verify(
        &self,
        signature: &[u8],
        bytes: &[u8],
        signing_key: &KeyHandle,
    ) -> Result<bool, ProviderError> {
        if self.fail_verify.load(Ordering::SeqCst) {
            return Err(ProviderError::InvalidKey("verification disabled".into()));
        }
        self.inner.verify(signature, bytes, signing_key).await
    }

    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, ProviderError> {
        self.inner.random_bytes(n)
    }
}

pub fn identity(name: &str) -> Identity {
    block_on(Identity::create(&NativeProvider, name, 16)).unwrap()
}

pub fn identities(names: &[&str]) -> Vec<Identity> {
    names.iter().map(|name| identity(name)).collect()
}

pub fn snapshot_of(members: &[Identity]) -> RosterSnapshot {
    members.iter().map(Identity::profile).collect()
}

pub fn session_with<P: PrimitiveProvider + ?Sized>(provider: Arc<P>) -> Session<P> {
    Session::new(provider, EngineConfig::default())
}

pub fn native_session() -> Session<NativeProvider> {
    session_with(Arc::new(NativeProvider))
}
