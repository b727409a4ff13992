use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::aggregator::BatchError;

/// One unit of work awaiting a batch.
pub(crate) struct PendingRequest {
    pub(crate) text: String,
    pub(crate) slot: oneshot::Sender<Result<String, BatchError>>,
}

impl PendingRequest {
    /// Resolve the caller's handle. The caller may already have abandoned
    /// it; delivery to a dropped handle is a no-op.
    pub(crate) fn deliver(self, result: Result<String, BatchError>) {
        let _ = self.slot.send(result);
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

struct Inner {
    items: VecDeque<PendingRequest>,
    armed: bool,
}

/// Ordered collection of not-yet-dispatched requests for one route.
///
/// The `armed` flag tracks whether a flush task currently owns this queue.
/// It lives under the same lock as the items so that an append can never
/// race a disarming drain into a lost wakeup.
pub(crate) struct PendingQueue {
    inner: Mutex<Inner>,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                armed: false,
            }),
        }
    }

    /// Append a request. Returns true when the queue was unarmed, in which
    /// case the caller must spawn a flush task; the queue is armed on return.
    pub(crate) fn push(&self, req: PendingRequest) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.items.push_back(req);
        if inner.armed {
            false
        } else {
            inner.armed = true;
            true
        }
    }

    /// Drain the longest prefix whose cumulative character count stays
    /// within `max_chars`, capped at `max_texts` items. A non-empty queue
    /// always yields at least one request, even when that request alone
    /// exceeds the character budget. Returns `None` after disarming when
    /// the queue is empty.
    pub(crate) fn take_batch(
        &self,
        max_chars: usize,
        max_texts: usize,
    ) -> Option<Vec<PendingRequest>> {
        let mut inner = self.inner.lock().unwrap();

        if inner.items.is_empty() {
            inner.armed = false;
            return None;
        }

        let mut size = 0;
        let mut n = 0;
        while n < inner.items.len() && n < max_texts {
            let len = inner.items[n].char_len();
            if n > 0 && size + len > max_chars {
                break;
            }
            size += len;
            n += 1;
        }

        Some(inner.items.drain(..n).collect())
    }

    /// Remove everything and disarm. Shutdown path.
    pub(crate) fn drain_all(&self) -> Vec<PendingRequest> {
        let mut inner = self.inner.lock().unwrap();
        inner.armed = false;
        inner.items.drain(..).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }
}
