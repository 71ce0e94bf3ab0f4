// Push channel connection lifecycle
// Disconnected -> Connecting -> Connected -> Disconnected, with validated transitions,
// a bounded transition history and a generation counter identifying the live socket task

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NotificationError, NotificationResult};

/// Keep the history small; it exists for debugging, not auditing
const MAX_HISTORY: usize = 32;

/// Connection state of the push channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Transport open and the registration handshake sent
    Connected,
}

impl ConnectionState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    #[default]
    Initial,
    ConnectRequested,
    TransportOpened,
    TransportClosed,
    TransportError,
    DisconnectRequested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: Option<ConnectionState>,
    pub to_state: ConnectionState,
    pub timestamp: DateTime<Utc>,
    pub reason: TransitionReason,
    pub generation: u64,
}

/// State machine guarding the single push connection
///
/// Every `connect` attempt gets a new generation. A socket task only acts on
/// the lifecycle while its generation is current, so a task outliving an
/// explicit disconnect cannot resurrect the connection or deliver events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionLifecycle {
    pub state: ConnectionState,
    pub generation: u64,
    pub connected_at: Option<DateTime<Utc>>,
    pub state_history: Vec<StateTransition>,
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            connected_at: None,
            state_history: vec![StateTransition {
                from_state: None,
                to_state: ConnectionState::Disconnected,
                timestamp: Utc::now(),
                reason: TransitionReason::Initial,
                generation: 0,
            }],
        }
    }

    /// Transition to a new state with validation and history tracking
    pub fn transition_to(
        &mut self,
        new_state: ConnectionState,
        reason: TransitionReason,
    ) -> NotificationResult<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(NotificationError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }

        let now = Utc::now();
        match new_state {
            ConnectionState::Connected => self.connected_at = Some(now),
            ConnectionState::Disconnected => self.connected_at = None,
            ConnectionState::Connecting => {},
        }

        self.state_history.push(StateTransition {
            from_state: Some(self.state),
            to_state: new_state,
            timestamp: now,
            reason,
            generation: self.generation,
        });
        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }

        self.state = new_state;
        Ok(())
    }

    /// Start a connection attempt
    ///
    /// Returns the attempt's generation, or `None` when a connection is
    /// already being established or open.
    pub fn begin_connect(&mut self) -> NotificationResult<Option<u64>> {
        if self.state != ConnectionState::Disconnected {
            return Ok(None);
        }
        self.generation += 1;
        self.transition_to(ConnectionState::Connecting, TransitionReason::ConnectRequested)?;
        Ok(Some(self.generation))
    }

    /// Mark the attempt `generation` as connected; false if it was superseded
    pub fn mark_connected(&mut self, generation: u64) -> bool {
        self.is_current(generation)
            && self
                .transition_to(ConnectionState::Connected, TransitionReason::TransportOpened)
                .is_ok()
    }

    /// Move to Disconnected on behalf of attempt `generation`
    ///
    /// Returns true when the state actually changed.
    pub fn finish(&mut self, generation: u64, reason: TransitionReason) -> bool {
        self.is_current(generation) && self.transition_to(ConnectionState::Disconnected, reason).is_ok()
    }

    /// Unconditional teardown; invalidates whatever attempt is in flight
    ///
    /// Returns true when the state actually changed.
    pub fn reset(&mut self) -> bool {
        self.generation += 1;
        self.state != ConnectionState::Disconnected
            && self
                .transition_to(ConnectionState::Disconnected, TransitionReason::DisconnectRequested)
                .is_ok()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}
