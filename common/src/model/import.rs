use serde::{Deserialize, Serialize};

/// Preview counts produced by the check stage of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub adds: u64,
    pub updates: u64,
}

/// What a single imported row will do once committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Insert,
    Update,
}

impl ImportStats {
    pub fn record(&mut self, action: RowAction) {
        match action {
            RowAction::Insert => self.adds += 1,
            RowAction::Update => self.updates += 1,
        }
    }
}
