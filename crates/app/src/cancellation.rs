//! Registry of cancel handles for in-flight repository jobs.
//!
//! At most one live handle exists per [`JobKey`]. Registering a new handle
//! for a key replaces the old one without error, so callers that want the old
//! job stopped must cancel it first. Unregistering is identity-checked: an
//! older job finishing never removes the handle of the job that replaced it.
//!
//! A job taking over a key can wait for the previous holder to release it
//! with [`CancellationRegistry::release_waiter`], so the two never share a
//! working copy.

use clone_pipeline_domain::{CancellationReason, JobKey, RepositoryUri};
use clone_pipeline_shared::CancellationToken;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Identity of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

#[derive(Debug)]
struct Entry {
    id: RegistrationId,
    token: CancellationToken,
    released: Arc<watch::Sender<bool>>,
}

/// Resolves once a registration has been released.
#[derive(Debug)]
pub struct ReleaseWaiter {
    receiver: watch::Receiver<bool>,
}

impl ReleaseWaiter {
    /// Wait for the release. A registration replaced without being released
    /// also counts as released.
    pub async fn wait(mut self) {
        let _ = self.receiver.wait_for(|released| *released).await;
    }

    /// Returns true when the registration is already released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }
}

/// Thread-safe map from job key to cancel handle.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    entries: Mutex<HashMap<JobKey, Entry>>,
    next_id: AtomicU64,
}

impl CancellationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` under `key`, replacing any previous handle.
    pub fn register_cancelable(&self, key: JobKey, token: CancellationToken) -> RegistrationId {
        self.insert(key, token).0
    }

    fn insert(
        &self,
        key: JobKey,
        token: CancellationToken,
    ) -> (RegistrationId, Arc<watch::Sender<bool>>) {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let released = Arc::new(watch::Sender::new(false));
        self.lock().insert(
            key,
            Entry {
                id,
                token,
                released: Arc::clone(&released),
            },
        );
        (id, released)
    }

    /// Register and return a guard that unregisters on drop.
    #[must_use]
    pub fn register_scoped(
        self: &Arc<Self>,
        key: JobKey,
        token: CancellationToken,
    ) -> ScopedRegistration {
        let (id, released) = self.insert(key.clone(), token);
        ScopedRegistration {
            registry: Arc::clone(self),
            key,
            id,
            released,
        }
    }

    /// Signal the handle registered under `key`.
    ///
    /// Returns true only when this call moved the handle to cancelled.
    pub fn cancel(&self, key: &JobKey, reason: CancellationReason) -> bool {
        let token = self.lock().get(key).map(|entry| entry.token.clone());
        token.is_some_and(|token| token.cancel_with_reason(reason.as_str()))
    }

    /// Waiter for the registration currently held under `key`, if any.
    #[must_use]
    pub fn release_waiter(&self, key: &JobKey) -> Option<ReleaseWaiter> {
        self.lock().get(key).map(|entry| ReleaseWaiter {
            receiver: entry.released.subscribe(),
        })
    }

    /// Signal every job kind registered for `uri`. Returns the number signalled.
    pub fn cancel_repository(&self, uri: &RepositoryUri, reason: CancellationReason) -> usize {
        let tokens: Vec<CancellationToken> = self
            .lock()
            .iter()
            .filter(|(key, _)| &key.uri == uri)
            .map(|(_, entry)| entry.token.clone())
            .collect();
        tokens
            .into_iter()
            .filter(|token| token.cancel_with_reason(reason.as_str()))
            .count()
    }

    /// Remove the handle under `key` if it is still registration `id`.
    pub fn unregister(&self, key: &JobKey, id: RegistrationId) -> bool {
        let mut entries = self.lock();
        if !entries.get(key).is_some_and(|entry| entry.id == id) {
            return false;
        }
        if let Some(entry) = entries.remove(key) {
            entry.released.send_replace(true);
        }
        true
    }

    /// Returns true when a handle is registered under `key`.
    #[must_use]
    pub fn is_registered(&self, key: &JobKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, Entry>> {
        // Entries stay consistent even if a holder panicked mid-operation.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration that is removed from its registry when dropped.
#[derive(Debug)]
pub struct ScopedRegistration {
    registry: Arc<CancellationRegistry>,
    key: JobKey,
    id: RegistrationId,
    released: Arc<watch::Sender<bool>>,
}

impl ScopedRegistration {
    /// Registration id.
    #[must_use]
    pub const fn id(&self) -> RegistrationId {
        self.id
    }
}

impl Drop for ScopedRegistration {
    fn drop(&mut self) {
        let _ = self.registry.unregister(&self.key, self.id);
        self.released.send_replace(true);
    }
}
