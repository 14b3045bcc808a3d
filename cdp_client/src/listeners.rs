use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};
use hashbrown::HashMap;
use serde::de::DeserializeOwned;

use cdp_types::{CdpEventMessage, Method, MethodId, MethodType};

use crate::domains::target::SessionId;

/// Which events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event.
    All,
    /// Every event of a domain, like `Debugger`.
    Domain(MethodId),
    /// A single event, like `Debugger.paused`.
    Method(MethodId),
}

impl EventFilter {
    pub fn matches(&self, event: &CdpEventMessage) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Domain(domain) => event.domain_name() == *domain,
            EventFilter::Method(method) => event.method == *method,
        }
    }
}

/// All the currently active listeners
#[derive(Debug, Default)]
pub struct EventListeners {
    /// Tracks the listeners for each event identified by the key
    listeners: HashMap<MethodId, Vec<EventListener>>,
    /// Domain wide and catch-all listeners, checked against every event
    wildcards: Vec<EventListener>,
    /// Set once the bus was shut down, later listeners are dropped at once
    closed: bool,
}

impl EventListeners {
    /// Register a subscription
    pub fn add_listener(&mut self, req: EventListenerRequest) {
        let EventListenerRequest {
            listener,
            filter,
            session_id,
        } = req;
        if self.closed {
            // dropping the sender completes the subscriber's stream
            return;
        }
        let sub = EventListener {
            listener,
            session_id,
            filter: filter.clone(),
        };
        match filter {
            EventFilter::Method(method) => self.listeners.entry(method).or_default().push(sub),
            _ => self.wildcards.push(sub),
        }
    }

    /// Deliver an event to every matching listener.
    ///
    /// Never blocks: each listener buffers independently. Listeners whose
    /// stream was dropped are removed.
    pub fn start_send(&mut self, event: CdpEventMessage) {
        let event = Arc::new(event);
        if let Some(subscriptions) = self.listeners.get_mut(event.method.as_ref()) {
            subscriptions.retain(|sub| sub.start_send(&event));
            if subscriptions.is_empty() {
                self.listeners.remove(event.method.as_ref());
            }
        }
        self.wildcards.retain(|sub| sub.start_send(&event));
    }

    /// Housekeeping: forget listeners whose receiving half is gone
    pub fn prune(&mut self) {
        self.listeners.retain(|_, subs| {
            subs.retain(|sub| !sub.listener.is_closed());
            !subs.is_empty()
        });
        self.wildcards.retain(|sub| !sub.listener.is_closed());
    }

    /// Drop every listener so every subscriber observes the end of its
    /// stream, and refuse new ones.
    pub fn close_all(&mut self) {
        self.closed = true;
        self.listeners.clear();
        self.wildcards.clear();
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum::<usize>() + self.wildcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct EventListenerRequest {
    listener: UnboundedSender<Arc<CdpEventMessage>>,
    pub filter: EventFilter,
    /// Only deliver events of this session
    pub session_id: Option<SessionId>,
}

impl EventListenerRequest {
    pub fn new(
        listener: UnboundedSender<Arc<CdpEventMessage>>,
        filter: EventFilter,
        session_id: Option<SessionId>,
    ) -> Self {
        Self {
            listener,
            filter,
            session_id,
        }
    }

    /// A subscription for the typed event `T`
    pub fn typed<T: MethodType>(
        listener: UnboundedSender<Arc<CdpEventMessage>>,
        session_id: Option<SessionId>,
    ) -> Self {
        Self::new(listener, EventFilter::Method(T::method_id()), session_id)
    }
}

impl fmt::Debug for EventListenerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListenerRequest")
            .field("filter", &self.filter)
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// Represents a single event listener
pub struct EventListener {
    /// the sender half of the event channel
    listener: UnboundedSender<Arc<CdpEventMessage>>,
    session_id: Option<SessionId>,
    filter: EventFilter,
}

impl EventListener {
    /// Queue in a new event, returns `false` once the receiver is gone.
    fn start_send(&self, event: &Arc<CdpEventMessage>) -> bool {
        if !self.filter.matches(event) {
            return true;
        }
        if let Some(session_id) = self.session_id.as_ref() {
            if event.session_id() != Some(session_id.as_ref()) {
                return true;
            }
        }
        self.listener.unbounded_send(Arc::clone(event)).is_ok()
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("filter", &self.filter)
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// The receiver part of an untyped event subscription
#[must_use = "streams do nothing unless polled"]
pub struct RawEventStream {
    events: UnboundedReceiver<Arc<CdpEventMessage>>,
}

impl RawEventStream {
    pub fn new(events: UnboundedReceiver<Arc<CdpEventMessage>>) -> Self {
        Self { events }
    }

    /// Decode the events of this stream as `T`.
    pub fn typed<T: MethodType + DeserializeOwned>(self) -> EventStream<T> {
        EventStream::new(self.events)
    }
}

impl fmt::Debug for RawEventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEventStream").finish()
    }
}

impl Stream for RawEventStream {
    type Item = Arc<CdpEventMessage>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_next_unpin(cx)
    }
}

/// The receiver part of a typed event subscription.
///
/// Envelopes of other methods, without `params`, or whose `params` do not
/// decode as `T` are skipped.
#[must_use = "streams do nothing unless polled"]
pub struct EventStream<T> {
    events: UnboundedReceiver<Arc<CdpEventMessage>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish()
    }
}

impl<T: MethodType + DeserializeOwned> EventStream<T> {
    pub fn new(events: UnboundedReceiver<Arc<CdpEventMessage>>) -> Self {
        Self {
            events,
            _marker: PhantomData,
        }
    }
}

impl<T: MethodType + DeserializeOwned> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let pin = self.get_mut();
        loop {
            let Some(event) = ready!(pin.events.poll_next_unpin(cx)) else {
                return Poll::Ready(None);
            };
            if event.method != T::method_id() {
                continue;
            }
            match event.decode_params::<T>() {
                Some(Ok(ev)) => return Poll::Ready(Some(ev)),
                Some(Err(err)) => {
                    tracing::debug!(target: "cdp_client::listeners", method = %event.method, "Failed to decode event params: {}", err);
                }
                None => {
                    tracing::trace!(target: "cdp_client::listeners", method = %event.method, "Skipping event without params");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc::unbounded;
    use futures::FutureExt;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Paused {
        reason: String,
    }

    impl MethodType for Paused {
        fn method_id() -> MethodId {
            "Debugger.paused".into()
        }
    }

    fn paused(reason: &str) -> CdpEventMessage {
        CdpEventMessage::new("Debugger.paused", Some(json!({ "reason": reason })))
    }

    #[tokio::test]
    async fn event_stream() {
        let (tx, rx) = unbounded();
        let mut stream = EventStream::<Paused>::new(rx);

        tx.unbounded_send(Arc::new(paused("other"))).unwrap();
        let next = stream.next().await.unwrap();
        assert_eq!(
            next,
            Paused {
                reason: "other".to_string()
            }
        );
    }

    #[tokio::test]
    async fn typed_stream_skips_absent_and_undecodable_params() {
        let (tx, rx) = unbounded();
        let mut stream = EventStream::<Paused>::new(rx);

        tx.unbounded_send(Arc::new(CdpEventMessage::new("Debugger.paused", None)))
            .unwrap();
        tx.unbounded_send(Arc::new(CdpEventMessage::new(
            "Debugger.paused",
            Some(json!({"reason": 42})),
        )))
        .unwrap();
        tx.unbounded_send(Arc::new(paused("exception"))).unwrap();
        drop(tx);

        assert_eq!(stream.next().await.unwrap().reason, "exception");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn fan_out_to_every_listener_in_order() {
        let mut listeners = EventListeners::default();
        let (fast_tx, mut fast) = unbounded();
        let (slow_tx, mut slow) = unbounded();
        listeners.add_listener(EventListenerRequest::typed::<Paused>(fast_tx, None));
        listeners.add_listener(EventListenerRequest::typed::<Paused>(slow_tx, None));

        for n in 0..3 {
            listeners.start_send(paused(&n.to_string()));
        }

        for n in 0..3 {
            let ev = fast.next().await.unwrap();
            assert_eq!(ev.params, Some(json!({ "reason": n.to_string() })));
        }
        // the slow one buffered everything
        for n in 0..3 {
            let ev = slow.next().await.unwrap();
            assert_eq!(ev.params, Some(json!({ "reason": n.to_string() })));
        }
    }

    #[tokio::test]
    async fn filters_by_method_domain_and_session() {
        let mut listeners = EventListeners::default();
        let (method_tx, mut by_method) = unbounded();
        let (domain_tx, mut by_domain) = unbounded();
        let (session_tx, mut by_session) = unbounded();
        let (all_tx, mut all) = unbounded();
        listeners.add_listener(EventListenerRequest::typed::<Paused>(method_tx, None));
        listeners.add_listener(EventListenerRequest::new(
            domain_tx,
            EventFilter::Domain("Debugger".into()),
            None,
        ));
        listeners.add_listener(EventListenerRequest::new(
            session_tx,
            EventFilter::All,
            Some("S1".into()),
        ));
        listeners.add_listener(EventListenerRequest::new(all_tx, EventFilter::All, None));

        listeners.start_send(CdpEventMessage::new("Debugger.resumed", Some(json!({}))));
        listeners.start_send(paused("other").with_session("S1"));
        listeners.start_send(CdpEventMessage::new("Page.loadEventFired", Some(json!({}))));

        assert_eq!(by_method.next().await.unwrap().method, "Debugger.paused");
        assert!(by_method.next().now_or_never().is_none());

        assert_eq!(by_domain.next().await.unwrap().method, "Debugger.resumed");
        assert_eq!(by_domain.next().await.unwrap().method, "Debugger.paused");
        assert!(by_domain.next().now_or_never().is_none());

        assert_eq!(by_session.next().await.unwrap().method, "Debugger.paused");
        assert!(by_session.next().now_or_never().is_none());

        for method in ["Debugger.resumed", "Debugger.paused", "Page.loadEventFired"] {
            assert_eq!(all.next().await.unwrap().method, method);
        }
    }

    #[tokio::test]
    async fn dropped_streams_are_removed() {
        let mut listeners = EventListeners::default();
        let (tx, rx) = unbounded();
        let (kept_tx, _kept) = unbounded();
        listeners.add_listener(EventListenerRequest::typed::<Paused>(tx, None));
        listeners.add_listener(EventListenerRequest::new(kept_tx, EventFilter::All, None));
        assert_eq!(listeners.len(), 2);

        drop(rx);
        listeners.start_send(paused("other"));
        assert_eq!(listeners.len(), 1);

        listeners.prune();
        assert_eq!(listeners.len(), 1);
    }

    #[tokio::test]
    async fn close_all_completes_streams() {
        let mut listeners = EventListeners::default();
        let (tx, rx) = unbounded();
        listeners.add_listener(EventListenerRequest::typed::<Paused>(tx, None));
        listeners.close_all();

        let mut stream = EventStream::<Paused>::new(rx);
        assert!(stream.next().await.is_none());

        let (late_tx, mut late) = unbounded();
        listeners.add_listener(EventListenerRequest::new(late_tx, EventFilter::All, None));
        assert!(listeners.is_empty());
        assert!(late.next().await.is_none());
    }
}
