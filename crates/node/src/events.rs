use coop::SessionEvent;
use log::{debug, error, info};

/// Writes a session notice to the log at a level matching its weight.
pub fn log_session_event(event: &SessionEvent) {
    let message = event.message();
    match event {
        SessionEvent::Latency { .. } => debug!("{message}"),
        _ if event.is_failure() => error!("{message}"),
        _ => info!("{message}"),
    }
}
