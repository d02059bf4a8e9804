//! Disconnect propagation

use std::ops::{Deref, DerefMut};

use log::info;

use crate::manager::Manager;

/// Owns a [`Manager`] and, when dropped, sets `api = UNAVAILABLE` on every
/// entity it mirrors, persisted and published.
///
/// Runs on every exit path of the owning scope, including a transport
/// error returned by `run` and panic unwinding.
pub struct ShutdownGuard {
    manager: Manager,
}

impl ShutdownGuard {
    pub fn new(manager: Manager) -> Self {
        Self { manager }
    }
}

impl Deref for ShutdownGuard {
    type Target = Manager;

    fn deref(&self) -> &Manager {
        &self.manager
    }
}

impl DerefMut for ShutdownGuard {
    fn deref_mut(&mut self) -> &mut Manager {
        &mut self.manager
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        info!("Shutting down, marking mirrored entities unavailable");
        self.manager.state_mut().mark_unavailable();
    }
}
