use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use trellis_core::TrellisError;

/// Host lifecycle.
///
/// `Uninitialized -> Initializing -> Ready -> Running -> Unloading -> Unloaded`,
/// with `Initializing -> Failed` when boot fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Running,
    Unloading,
    Unloaded,
    Failed,
}

impl HostState {
    pub fn can_transition(self, to: HostState) -> bool {
        use HostState::*;
        matches!(
            (self, to),
            (Uninitialized, Initializing)
                | (Initializing, Ready)
                | (Initializing, Failed)
                | (Ready, Running)
                | (Ready, Unloading)
                | (Running, Unloading)
                | (Unloading, Unloaded)
        )
    }

    pub fn transition(&mut self, to: HostState) -> Result<(), TrellisError> {
        if !self.can_transition(to) {
            return Err(TrellisError::InvalidState { from: self.to_string(), to: to.to_string() });
        }
        tracing::debug!(from = %self, to = %to, "Host state transition");
        *self = to;
        Ok(())
    }
}

/// One lifecycle shared by a [`crate::Host`] and the app it hands out.
#[derive(Debug, Clone, Default)]
pub struct SharedHostState(Arc<Mutex<HostState>>);

impl SharedHostState {
    pub fn get(&self) -> HostState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transition(&self, to: HostState) -> Result<(), TrellisError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).transition(to)
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Unloading => "unloading",
            Self::Unloaded => "unloaded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = HostState::default();
        for next in [
            HostState::Initializing,
            HostState::Ready,
            HostState::Running,
            HostState::Unloading,
            HostState::Unloaded,
        ] {
            state.transition(next).unwrap();
        }
        assert_eq!(state, HostState::Unloaded);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut state = HostState::Unloaded;
        let err = state.transition(HostState::Running).unwrap_err();
        assert_eq!(err.to_string(), "invalid host state transition: unloaded -> running");
        assert_eq!(state, HostState::Unloaded);
    }

    #[test]
    fn test_shared_state_is_seen_by_clones() {
        let state = SharedHostState::default();
        let handle = state.clone();
        state.transition(HostState::Initializing).unwrap();
        handle.transition(HostState::Ready).unwrap();
        assert_eq!(state.get(), HostState::Ready);
        assert!(state.transition(HostState::Initializing).is_err());
    }
}
