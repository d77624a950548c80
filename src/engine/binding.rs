// Per-slot resolve ownership: each display slot runs at most one resolve, and rebinding a slot
// cancels the resolve it replaces.

use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::orchestrator::CacheOrchestrator;

/// Identifier of a display position, e.g. a grid cell index.
pub type SlotId = usize;

struct SlotBinding {
    locator: Url,
    token: CancellationToken,
}

pub struct BindingScope {
    orchestrator: Arc<CacheOrchestrator>,
    scope: CancellationToken,
    slots: Mutex<HashMap<SlotId, SlotBinding>>,
}

impl BindingScope {
    pub fn new(orchestrator: Arc<CacheOrchestrator>) -> Self {
        Self {
            orchestrator,
            scope: CancellationToken::new(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `slot` to `locator` and start resolving it.
    ///
    /// Returns `None` when the slot is already bound to the same locator or the
    /// scope has been torn down. Otherwise any previous resolve for the slot is
    /// cancelled before the new one is spawned. The returned handle yields
    /// `None` for failures and cancellations alike.
    pub fn bind(&self, slot: SlotId, locator: Url) -> Option<JoinHandle<Option<DynamicImage>>> {
        if self.scope.is_cancelled() {
            return None;
        }

        let token = {
            let mut slots = self.slots.lock();
            if let Some(current) = slots.get(&slot) {
                if current.locator == locator && !current.token.is_cancelled() {
                    return None;
                }
                debug!("slot {} rebound, cancelling {}", slot, current.locator);
                current.token.cancel();
            }

            let token = self.scope.child_token();
            slots.insert(
                slot,
                SlotBinding {
                    locator: locator.clone(),
                    token: token.clone(),
                },
            );
            token
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        Some(tokio::spawn(async move {
            orchestrator.resolve_locator(&locator, &token).await
        }))
    }

    /// Cancel and forget whatever `slot` is bound to.
    pub fn unbind(&self, slot: SlotId) {
        if let Some(binding) = self.slots.lock().remove(&slot) {
            binding.token.cancel();
        }
    }

    /// Locator currently bound to `slot`.
    pub fn bound_locator(&self, slot: SlotId) -> Option<Url> {
        self.slots.lock().get(&slot).map(|b| b.locator.clone())
    }

    /// Tear the scope down: cancel every in-flight resolve and refuse new bindings.
    pub fn cancel_all(&self) {
        self.scope.cancel();
        self.slots.lock().clear();
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
