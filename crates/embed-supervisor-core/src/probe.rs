//! WebGL capability probe.

use tracing::{debug, warn};

use crate::surface::{ContextKind, Document};

/// Check whether the document can create a WebGL context.
///
/// The check runs on a throwaway surface so the real canvas never holds a
/// context before the runtime creates its own. The result is treated as a
/// permanent fact for the session; there is no retry.
pub fn probe(document: &dyn Document) -> bool {
    let mut surface = document.create_scratch_surface();

    for kind in ContextKind::ALL {
        if surface.acquire_context(kind) {
            debug!(context = kind.as_str(), "WebGL capability confirmed");
            return true;
        }
    }

    warn!("No WebGL context could be acquired");
    false
}
