//! Acknowledgement bookkeeping.
//!
//! Every emit that requests an acknowledgement draws a fresh id from one
//! process-wide monotonic counter, so ids are unique across all namespaces of
//! all clients in the process and the timeout handler can look an entry up by
//! id alone.

use std::sync::atomic::{AtomicU32, Ordering};

use tokio::task::AbortHandle;

use crate::value::Value;

static GLOBAL_ACK_ID: AtomicU32 = AtomicU32::new(1);

/// Draw the next process-wide ack id.
pub(crate) fn next_ack_id() -> u32 {
    GLOBAL_ACK_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) type AckCallback = Box<dyn FnOnce(Vec<Value>) + Send>;

/// One outstanding acknowledgement.
///
/// Removal from the ack table is the linearization point between the ack
/// callback and the timeout callback: whichever side removes the entry gets
/// to run, the other finds nothing and backs off.
pub(crate) struct AckEntry {
    pub callback: AckCallback,
    pub timer: Option<AbortHandle>,
}

impl std::fmt::Debug for AckEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckEntry")
            .field("timer", &self.timer.is_some())
            .finish()
    }
}
