use std::time::Duration;

use crate::net::Role;

/// User-facing notices raised by the router and the network workers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PeerConnected {
        name: String,
    },
    PeerAnnounced {
        name: String,
        nickname: String,
    },
    PeerDisconnected {
        name: String,
        display_name: String,
    },
    IdentityAssigned {
        name: String,
    },
    Latency {
        rtt: Duration,
    },
    ConnectionFailed {
        reason: String,
    },
    WorkerStopped {
        role: Role,
        reason: String,
    },
}

impl SessionEvent {
    pub fn message(&self) -> String {
        match self {
            SessionEvent::PeerConnected { name } => format!("{name} is joining"),
            SessionEvent::PeerAnnounced { nickname, .. } => {
                format!("Player {nickname} connected")
            }
            SessionEvent::PeerDisconnected { display_name, .. } => {
                format!("{display_name} disconnected")
            }
            SessionEvent::IdentityAssigned { name } => format!("Joined the session as {name}"),
            SessionEvent::Latency { rtt } => format!("Ping {} ms", rtt.as_millis()),
            SessionEvent::ConnectionFailed { reason } => format!("Connection failed: {reason}"),
            SessionEvent::WorkerStopped { role, reason } => {
                format!("{} network stopped: {reason}", role.as_str())
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionEvent::ConnectionFailed { .. } | SessionEvent::WorkerStopped { .. }
        )
    }
}
