//! Nearest-preceding-export lookup.
//!
//! Exports are usually sparse, so the entry returned for an address is only
//! the closest named export at or below it. Treat it as an area-of-ownership
//! hint, not as the function that actually contains the address.

use crate::model::ExportEntry;

/// Export list sorted by address, built once per run.
#[derive(Debug, Clone, Default)]
pub struct ExportIndex {
    entries: Vec<ExportEntry>,
}

impl ExportIndex {
    pub fn new(exports: impl IntoIterator<Item = ExportEntry>) -> Self {
        let mut entries: Vec<ExportEntry> =
            exports.into_iter().filter(|e| !e.name.is_empty()).collect();
        entries.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));
        Self { entries }
    }

    /// Rightmost export whose address is `<= address`.
    pub fn nearest_preceding(&self, address: u64) -> Option<&ExportEntry> {
        let idx = self.entries.partition_point(|e| e.address <= address);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
