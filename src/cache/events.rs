//! Archive lifecycle notifications.

use std::sync::Arc;

/// Receives notice when the bundle it is attached to goes away.
///
/// A handler is called at most once per bundle, then detached. `purged` is
/// true for explicit purges and false when the bundle is evicted, goes stale
/// or is released by its last user.
pub trait ArchiveEventHandler: Send + Sync {
    fn cleared(&self, purged: bool);
}

/// Shared event handler.
pub type ArchiveEventHandlerPtr = Arc<dyn ArchiveEventHandler>;

/// Handler identity, ignoring vtable differences.
pub(crate) fn same_handler(a: &ArchiveEventHandlerPtr, b: &ArchiveEventHandlerPtr) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
