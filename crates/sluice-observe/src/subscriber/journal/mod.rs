use sluice_core::{EngineEvent, Subscribe};

use crate::subscriber::view::log_event;

/// Writes every engine event to the tracing log.
#[derive(Debug, Default)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for Journal {
    fn on_event(&self, event: &EngineEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}
