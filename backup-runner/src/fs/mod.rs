//! File system access: source inventory and sorted tree walking.

pub mod scanner;
pub mod walker;

pub use scanner::{scan, Inventory, InventoryItem, ItemKind};
pub use walker::{walk_tree, Exclusions, TreeEntry};
