//! Change notification callbacks.

use herald_core::Comment;

/// Receives cache changes.
///
/// Called synchronously from the informer task, so implementations should
/// only record the change (for example, enqueue a key) and return.
pub trait ResourceEventHandler: Send + Sync {
    fn on_add(&self, obj: &Comment);

    /// Also called on resync, with `old == new`.
    fn on_update(&self, old: &Comment, new: &Comment);

    /// Receives the last known state of the object.
    fn on_delete(&self, obj: &Comment);
}
