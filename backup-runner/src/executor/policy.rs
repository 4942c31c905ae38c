//! Per-item transfer decision for the partial strategy.
//!
//! Under `full` every item is transferred and no policy is consulted. Under
//! `partial` the executor asks a [`PartialPolicy`] whether an item needs a new
//! copy, handing it the item's current fingerprint and the manifest of the
//! newest prior snapshot (if any).

use super::manifest::Manifest;
use crate::fs::InventoryItem;

pub trait PartialPolicy: Send + Sync {
    fn needs_backup(
        &self,
        item: &InventoryItem,
        fingerprint: &str,
        prior: Option<&Manifest>,
    ) -> bool;
}

/// Default partial policy: transfers nothing.
///
/// Partial runs therefore only prune old snapshots and write an empty
/// manifest. Comparing fingerprints against `prior` is left to other
/// implementations of [`PartialPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTransfer;

impl PartialPolicy for NeverTransfer {
    fn needs_backup(
        &self,
        _item: &InventoryItem,
        _fingerprint: &str,
        _prior: Option<&Manifest>,
    ) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ItemKind;

    #[test]
    fn test_never_transfer() {
        let item = InventoryItem {
            name: "report.pdf".to_string(),
            kind: ItemKind::File,
            size_bytes: 42,
        };
        assert!(!NeverTransfer.needs_backup(&item, "abc", None));
    }
}
