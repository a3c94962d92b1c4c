use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("no matching event within {0:?}")]
    Timeout(Duration),

    #[error("event bus closed")]
    Closed,
}
