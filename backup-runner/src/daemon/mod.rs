//! Process-level helpers run around the backup engine.

pub mod shutdown;
