use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use futures::channel::oneshot::Sender as OneshotSender;

use cdp_types::{CallId, MethodId, Response};

use crate::error::{CdpError, Result};

/// A command written to the transport and awaiting its response.
#[derive(Debug)]
struct PendingCall {
    sender: OneshotSender<Result<Response>>,
    method: MethodId,
    /// When the command was submitted
    started: Instant,
}

/// Commands awaiting their response, keyed by call id.
///
/// Every entry is completed at most once: resolving, failing or evicting an
/// entry removes it.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: FnvHashMap<CallId, PendingCall>,
}

impl PendingCalls {
    pub fn register(
        &mut self,
        id: CallId,
        method: MethodId,
        sender: OneshotSender<Result<Response>>,
        now: Instant,
    ) {
        self.calls.insert(
            id,
            PendingCall {
                sender,
                method,
                started: now,
            },
        );
    }

    /// Complete the call `id` with `result`.
    ///
    /// Returns `false` if no call with that id is pending, in which case the
    /// result is dropped.
    pub fn resolve(&mut self, id: CallId, result: Result<Response>) -> bool {
        match self.calls.remove(&id) {
            Some(call) => {
                if call.sender.send(result).is_err() {
                    tracing::debug!(target: "cdp_client::handler", %id, method = %call.method, "Caller went away before the response arrived");
                }
                true
            }
            None => {
                tracing::debug!(target: "cdp_client::handler", %id, "Dropping response for unknown call");
                false
            }
        }
    }

    /// Fail every pending call with the error `make_error` returns and return
    /// how many were failed.
    pub fn fail_all(&mut self, mut make_error: impl FnMut() -> CdpError) -> usize {
        let n = self.calls.len();
        for (_, call) in self.calls.drain() {
            let _ = call.sender.send(Err(make_error()));
        }
        n
    }

    /// Fail every call submitted more than `timeout` before `now` with
    /// [`CdpError::Timeout`].
    pub fn evict_timed_out(&mut self, now: Instant, timeout: Duration) -> usize {
        let timed_out: Vec<_> = self
            .calls
            .iter()
            .filter(|(_, call)| now.saturating_duration_since(call.started) > timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            if let Some(call) = self.calls.remove(id) {
                tracing::debug!(target: "cdp_client::handler", %id, method = %call.method, "Command timed out");
                let _ = call.sender.send(Err(CdpError::Timeout));
            }
        }
        timed_out.len()
    }

    /// Drop the calls whose caller stopped waiting. A late response to any of
    /// them is treated as unknown.
    pub fn evict_canceled(&mut self) -> usize {
        let before = self.calls.len();
        self.calls.retain(|id, call| {
            let canceled = call.sender.is_canceled();
            if canceled {
                tracing::trace!(target: "cdp_client::handler", %id, method = %call.method, "Evicting canceled command");
            }
            !canceled
        });
        before - self.calls.len()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::oneshot;
    use serde_json::json;

    use super::*;

    fn call(pending: &mut PendingCalls, id: u64) -> oneshot::Receiver<Result<Response>> {
        let (tx, rx) = oneshot::channel();
        pending.register(
            CallId::new(id),
            "Runtime.evaluate".into(),
            tx,
            Instant::now(),
        );
        rx
    }

    #[tokio::test]
    async fn resolves_exactly_once() {
        let mut pending = PendingCalls::default();
        let rx = call(&mut pending, 1);

        let resp = Response::success(CallId::new(1), json!({"n": 1}));
        assert!(pending.resolve(CallId::new(1), Ok(resp.clone())));
        // a duplicate response is dropped
        assert!(!pending.resolve(CallId::new(1), Ok(resp.clone())));

        assert_eq!(rx.await.unwrap().unwrap(), resp);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_a_noop() {
        let mut pending = PendingCalls::default();
        let mut rx = call(&mut pending, 1);

        let resp = Response::success(CallId::new(99), json!({}));
        assert!(!pending.resolve(CallId::new(99), Ok(resp)));
        assert_eq!(pending.len(), 1);
        assert!(rx.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_all_drains() {
        let mut pending = PendingCalls::default();
        let first = call(&mut pending, 1);
        let second = call(&mut pending, 2);

        assert_eq!(pending.fail_all(|| CdpError::ConnectionClosed), 2);
        assert!(pending.is_empty());
        assert!(first.await.unwrap().unwrap_err().is_connection_closed());
        assert!(second.await.unwrap().unwrap_err().is_connection_closed());
        assert_eq!(pending.fail_all(|| CdpError::ConnectionClosed), 0);
    }

    #[tokio::test]
    async fn evicts_timed_out() {
        let mut pending = PendingCalls::default();
        let start = Instant::now();
        let (tx, old) = oneshot::channel();
        pending.register(CallId::new(1), "Debugger.enable".into(), tx, start);
        let (tx, fresh) = oneshot::channel();
        pending.register(
            CallId::new(2),
            "Debugger.pause".into(),
            tx,
            start + Duration::from_secs(20),
        );

        let evicted =
            pending.evict_timed_out(start + Duration::from_secs(31), Duration::from_secs(30));
        assert_eq!(evicted, 1);
        assert!(matches!(old.await.unwrap(), Err(CdpError::Timeout)));
        assert_eq!(pending.len(), 1);
        drop(fresh);
    }

    #[tokio::test]
    async fn evicts_canceled() {
        let mut pending = PendingCalls::default();
        let dropped = call(&mut pending, 1);
        let _kept = call(&mut pending, 2);
        drop(dropped);

        assert_eq!(pending.evict_canceled(), 1);
        assert_eq!(pending.len(), 1);
        let late = Response::success(CallId::new(1), json!({}));
        assert!(!pending.resolve(CallId::new(1), Ok(late)));
    }
}
