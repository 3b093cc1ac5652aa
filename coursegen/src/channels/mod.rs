//! State merge strategies used by the compiled graph.

mod updater;

pub use updater::{BoxedStateUpdater, FieldBasedUpdater, ReplaceUpdater, StateUpdater};
