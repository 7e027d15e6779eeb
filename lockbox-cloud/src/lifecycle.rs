//! File lifecycle state machine.
//!
//! ```text
//! PlaintextLocal -> EncryptedRemote -> DecryptedLocal -> HandedOffRemote -> EncryptedRemote
//!                          ^                  |
//!                          +------------------+
//! ```
//!
//! States are tracked per slot id. A hand-off is tracked under the share
//! record id, which is also the slot the recipient's new key pair lands in.

use crate::error::{CloudError, CloudResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileState {
    PlaintextLocal,
    EncryptedRemote,
    /// Decrypted by the holder of the file's private key.
    DecryptedLocal,
    /// Plaintext uploaded to a recipient's path; protected only by storage ACLs.
    HandedOffRemote,
}

impl FileState {
    pub fn can_transition_to(self, next: FileState) -> bool {
        use FileState::*;
        matches!(
            (self, next),
            (PlaintextLocal, EncryptedRemote)
                | (EncryptedRemote, DecryptedLocal)
                | (DecryptedLocal, HandedOffRemote)
                | (DecryptedLocal, EncryptedRemote)
                | (HandedOffRemote, EncryptedRemote)
        )
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Last known state per slot.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    states: Mutex<HashMap<String, FileState>>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, slot: &str) -> Option<FileState> {
        self.lock().get(slot).copied()
    }

    /// Starts (or restarts) tracking `slot` in `state`.
    pub fn begin(&self, slot: &str, state: FileState) {
        self.lock().insert(slot.to_string(), state);
        debug!(slot, %state, "lifecycle start");
    }

    /// Checks that `slot` may move to `next`. A slot that is not tracked yet
    /// is assumed to be in `assumed`.
    pub fn check(&self, slot: &str, assumed: FileState, next: FileState) -> CloudResult<()> {
        let current = self.state(slot).unwrap_or(assumed);
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(CloudError::InvalidTransition {
                slot_id: slot.to_string(),
                from: current,
                to: next,
            })
        }
    }

    /// Moves `slot` to `next`, validating the transition first.
    pub fn transition(&self, slot: &str, assumed: FileState, next: FileState) -> CloudResult<()> {
        let mut states = self.lock();
        let current = states.get(slot).copied().unwrap_or(assumed);
        if !current.can_transition_to(next) {
            return Err(CloudError::InvalidTransition {
                slot_id: slot.to_string(),
                from: current,
                to: next,
            });
        }
        states.insert(slot.to_string(), next);
        debug!(slot, from = %current, to = %next, "lifecycle transition");
        Ok(())
    }

    /// Stops tracking `slot`.
    pub fn forget(&self, slot: &str) {
        self.lock().remove(slot);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FileState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
