//! Explicit registry lifetime
//!
//! A `RegistryContext` builds its registry on first use, so an application
//! that never touches devices never starts a backend. Tearing the context
//! down releases every backend and invalidates outstanding handles.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use device_backend::Backend;

use crate::error::{RegistryError, Result};
use crate::registry::Registry;

type BackendFactory = Box<dyn Fn() -> Result<Vec<Arc<dyn Backend>>> + Send + Sync>;

enum ContextState {
    Uninitialized,
    Ready(Registry),
    TornDown,
}

/// Owner of the process-wide registry
///
/// # Example
///
/// ```rust,ignore
/// let context = RegistryContext::new(|| Ok(vec![disks_backend()]));
/// let registry = context.registry()?;
/// let devices = registry.all_devices();
/// context.teardown();
/// ```
pub struct RegistryContext {
    factory: BackendFactory,
    state: Mutex<ContextState>,
}

impl RegistryContext {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Vec<Arc<dyn Backend>>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            state: Mutex::new(ContextState::Uninitialized),
        }
    }

    /// The registry, creating it and running the initial resync on first use
    pub fn registry(&self) -> Result<Registry> {
        let mut state = self.state.lock();
        match &*state {
            ContextState::Ready(registry) => return Ok(registry.clone()),
            ContextState::TornDown => return Err(RegistryError::TornDown),
            ContextState::Uninitialized => {}
        }

        let backends = (self.factory)()?;
        let registry = Registry::new(backends);
        let devices = registry.resync();
        info!("Device registry ready with {} devices", devices);

        *state = ContextState::Ready(registry.clone());
        Ok(registry)
    }

    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.lock(), ContextState::Ready(_))
    }

    /// Release the registry; later `registry()` calls fail
    pub fn teardown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), ContextState::TornDown);
        if let ContextState::Ready(registry) = previous {
            registry.teardown();
        } else {
            debug!("Registry context torn down before first use");
        }
    }
}

impl Drop for RegistryContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for RegistryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            ContextState::Uninitialized => "uninitialized",
            ContextState::Ready(_) => "ready",
            ContextState::TornDown => "torn down",
        };
        f.debug_struct("RegistryContext").field("state", &state).finish()
    }
}
