use hashbrown::HashMap;

use cdp_types::{CdpEventMessage, MethodType};

use crate::domains::target::{
    EventAttachedToTarget, EventDetachedFromTarget, EventTargetDestroyed, SessionId, TargetId,
};
use crate::error::{CdpError, Result};

/// Represents a Session within the cdp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Identifier for this session.
    id: SessionId,
    /// The identifier of the target this session is attached to.
    target_id: TargetId,
    /// The kind of target, like `page` or `worker`.
    target_type: String,
    /// The session the attach was announced on, `None` for the root
    /// connection.
    parent: Option<SessionId>,
}

impl Session {
    pub fn new(
        id: SessionId,
        target_id: TargetId,
        target_type: impl Into<String>,
        parent: Option<SessionId>,
    ) -> Self {
        Self {
            id,
            target_id,
            target_type: target_type.into(),
            parent,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn parent(&self) -> Option<&SessionId> {
        self.parent.as_ref()
    }
}

/// Where a command is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// The root (browser) connection.
    Root,
    /// An attached session multiplexed over the connection.
    Session(&'a Session),
}

/// Keeps track of all the currently attached sessions.
///
/// There can be multiple sessions per target.
#[derive(Debug, Default)]
pub struct SessionRouter {
    sessions: HashMap<SessionId, Session>,
}

impl SessionRouter {
    /// Resolve the destination of a command addressed to `session_id`.
    pub fn resolve_target(&self, session_id: Option<&SessionId>) -> Result<Route<'_>> {
        match session_id {
            None => Ok(Route::Root),
            Some(id) => self
                .sessions
                .get(id)
                .map(Route::Session)
                .ok_or_else(|| CdpError::UnknownSession(id.clone())),
        }
    }

    /// Track the session lifecycle events, other events are ignored.
    ///
    /// Must run before the event is published so subscribers observe the
    /// updated routing table.
    pub fn on_event(&mut self, event: &CdpEventMessage) {
        let method: &str = &event.method;
        let parent = event.session_id().map(SessionId::from);

        if method == EventAttachedToTarget::IDENTIFIER {
            if let Some(Ok(ev)) = event.decode_params::<EventAttachedToTarget>() {
                self.attach(Session::new(
                    ev.session_id,
                    ev.target_info.target_id,
                    ev.target_info.r#type,
                    parent,
                ));
            } else {
                tracing::debug!(target: "cdp_client::handler::session", "Ignoring undecodable {}", EventAttachedToTarget::method_id());
            }
        } else if method == EventDetachedFromTarget::IDENTIFIER {
            if let Some(Ok(ev)) = event.decode_params::<EventDetachedFromTarget>() {
                self.detach(&ev.session_id);
            }
        } else if method == EventTargetDestroyed::IDENTIFIER {
            if let Some(Ok(ev)) = event.decode_params::<EventTargetDestroyed>() {
                self.on_target_destroyed(&ev.target_id);
            }
        }
    }

    pub fn attach(&mut self, session: Session) {
        tracing::debug!(target: "cdp_client::handler::session", session = %session.id, target = %session.target_id, "Attached session");
        self.sessions.insert(session.id.clone(), session);
    }

    /// Drop the session `id` together with every session attached through it.
    ///
    /// Returns the removed sessions.
    pub fn detach(&mut self, id: &SessionId) -> Vec<Session> {
        let mut removed = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(id) = stack.pop() {
            if let Some(session) = self.sessions.remove(&id) {
                stack.extend(
                    self.sessions
                        .values()
                        .filter(|s| s.parent.as_ref() == Some(&id))
                        .map(|s| s.id.clone()),
                );
                tracing::debug!(target: "cdp_client::handler::session", session = %session.id, "Detached session");
                removed.push(session);
            }
        }
        removed
    }

    /// Drop every session attached to `target_id`.
    pub fn on_target_destroyed(&mut self, target_id: &TargetId) -> Vec<Session> {
        let ids: Vec<_> = self
            .sessions
            .values()
            .filter(|s| &s.target_id == target_id)
            .map(|s| s.id.clone())
            .collect();
        ids.iter().flat_map(|id| self.detach(id)).collect()
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// All currently attached sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn attached(session: &str, target: &str) -> CdpEventMessage {
        CdpEventMessage::new(
            "Target.attachedToTarget",
            Some(json!({
                "sessionId": session,
                "targetInfo": {
                    "targetId": target,
                    "type": "page",
                    "title": "",
                    "url": "about:blank",
                    "attached": true
                },
                "waitingForDebugger": false
            })),
        )
    }

    #[test]
    fn resolves_root_known_and_unknown() {
        let mut router = SessionRouter::default();
        router.on_event(&attached("S1", "T1"));

        assert_eq!(router.resolve_target(None).unwrap(), Route::Root);
        match router.resolve_target(Some(&"S1".into())).unwrap() {
            Route::Session(session) => {
                assert_eq!(session.target_id(), &TargetId::new("T1"));
                assert_eq!(session.target_type(), "page");
                assert!(session.parent().is_none());
            }
            Route::Root => panic!("expected a session route"),
        }
        assert!(matches!(
            router.resolve_target(Some(&"S9".into())),
            Err(CdpError::UnknownSession(id)) if id == SessionId::new("S9")
        ));
    }

    #[test]
    fn detach_drops_children() {
        let mut router = SessionRouter::default();
        router.on_event(&attached("S1", "T1"));
        router.on_event(&attached("S2", "T2").with_session("S1"));
        router.on_event(&attached("S3", "T3").with_session("S2"));
        router.on_event(&attached("S4", "T4"));
        assert_eq!(router.len(), 4);

        router.on_event(&CdpEventMessage::new(
            "Target.detachedFromTarget",
            Some(json!({"sessionId": "S1"})),
        ));
        assert_eq!(router.len(), 1);
        assert!(router.get(&"S4".into()).is_some());
    }

    #[test]
    fn target_destroyed_drops_its_sessions() {
        let mut router = SessionRouter::default();
        router.on_event(&attached("S1", "T1"));
        router.on_event(&attached("S2", "T1"));
        router.on_event(&attached("S3", "T2"));

        router.on_event(&CdpEventMessage::new(
            "Target.targetDestroyed",
            Some(json!({"targetId": "T1"})),
        ));
        let left: Vec<_> = router.sessions().map(|s| s.session_id().clone()).collect();
        assert_eq!(left, vec![SessionId::new("S3")]);
    }

    #[test]
    fn ignores_unrelated_and_undecodable_events() {
        let mut router = SessionRouter::default();
        router.on_event(&CdpEventMessage::new("Page.loadEventFired", Some(json!({}))));
        router.on_event(&CdpEventMessage::new(
            "Target.attachedToTarget",
            Some(json!({"sessionId": 5})),
        ));
        assert!(router.is_empty());
    }
}
