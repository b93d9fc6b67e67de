use std::any::Any;

use tracing::error;

use crate::Error;

/// Out-of-band sink for errors that end a key's processing for good.
pub(crate) fn handle_error(
    context: &str,
    e: &Error,
) {
    error!("[{}] {}", context, e);
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
