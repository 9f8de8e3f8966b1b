// Copyright 2025 Cowboy AI, LLC.

//! Cancellable request wrapper
//!
//! Every outbound operation a machine issues goes through [`issue`]: the
//! operation runs on its own task, racing a cancellation token. Exactly one
//! outcome event reaches the owner's mailbox per issued request, unless the
//! request is cancelled first, in which case no event is delivered at all.
//! Cancelling after completion is a no-op.

use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identity of one issued request, echoed back with its outcome
///
/// The page is the page the request was issued for. The id is unique per
/// owning machine, so a machine can tell a late response from the one it is
/// currently waiting on even when both target the same page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag {
    /// Owner-scoped monotonic request id
    pub id: u64,
    /// 1-based page the request was issued for
    pub page: u64,
}

/// Control handle for one in-flight request
#[derive(Debug)]
pub struct RequestHandle {
    tag: RequestTag,
    token: CancellationToken,
}

impl RequestHandle {
    /// Tag of the request this handle controls
    pub fn tag(&self) -> RequestTag {
        self.tag
    }

    /// Cancel the request; idempotent, and a no-op once the outcome
    /// has already been delivered
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancel has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Issue an operation and deliver its outcome into the owner's mailbox
///
/// `wrap` turns the raw outcome into the owner's event type, tagged with the
/// request identity so the owner can discard stale responses.
pub fn issue<O, E, F, W>(
    tag: RequestTag,
    operation: F,
    sink: mpsc::UnboundedSender<E>,
    wrap: W,
) -> RequestHandle
where
    F: Future<Output = O> + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    W: FnOnce(RequestTag, O) -> E + Send + 'static,
{
    let token = CancellationToken::new();
    let task_token = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = task_token.cancelled() => {
                debug!(request_id = tag.id, page = tag.page, "request cancelled in flight");
            }
            outcome = operation => {
                if sink.send(wrap(tag, outcome)).is_err() {
                    warn!(request_id = tag.id, page = tag.page, "request outcome dropped, owner mailbox closed");
                }
            }
        }
    });

    RequestHandle { tag, token }
}
