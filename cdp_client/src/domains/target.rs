//! Supports additional targets discovery and allows to attach to them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::{Client, TargetSession};
use crate::error::Result;
use crate::listeners::EventStream;

use super::Domain;

/// Unique identifier of an attached debugging session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

/// Unique identifier of an inspectable target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

macro_rules! string_id {
    ($id:ident) => {
        impl $id {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn inner(&self) -> &String {
                &self.0
            }
        }

        impl AsRef<str> for $id {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $id {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $id {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$id> for String {
            fn from(id: $id) -> String {
                id.0
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(SessionId);
string_id!(TargetId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: TargetId,
    /// List of types: https://source.chromium.org/chromium/chromium/src/+/main:content/browser/devtools/devtools_agent_host_impl.cc?ss=chromium&q=f:devtools%20-f:out%20%22::kTypeTab%5B%5D%22
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub url: String,
    /// Whether the target has an attached client.
    pub attached: bool,
    /// Opener target Id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opener_id: Option<TargetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_context_id: Option<String>,
}

/// Controls whether to discover available targets and notify via
/// `targetCreated/targetInfoChanged/targetDestroyed` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDiscoverTargetsParams {
    pub discover: bool,
}

impl SetDiscoverTargetsParams {
    pub fn new(discover: bool) -> Self {
        Self { discover }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDiscoverTargetsReturns {}

impl_command!(SetDiscoverTargetsParams => SetDiscoverTargetsReturns, "Target.setDiscoverTargets");

/// Retrieves a list of available targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTargetsParams {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetsReturns {
    pub target_infos: Vec<TargetInfo>,
}

impl_command!(GetTargetsParams => GetTargetsReturns, "Target.getTargets");

/// Attaches to the target with given id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetParams {
    pub target_id: TargetId,
    /// Enables "flat" access to the session via specifying sessionId attribute
    /// in the commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
}

impl AttachToTargetParams {
    /// Attach in flat mode, the only mode this client routes.
    pub fn new(target_id: impl Into<TargetId>) -> Self {
        Self {
            target_id: target_id.into(),
            flatten: Some(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetReturns {
    /// Id assigned to the session.
    pub session_id: SessionId,
}

impl_command!(AttachToTargetParams => AttachToTargetReturns, "Target.attachToTarget");

/// Detaches session with given id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTargetParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Deprecated by the protocol, detach by `session_id` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<TargetId>,
}

impl DetachFromTargetParams {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            target_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachFromTargetReturns {}

impl_command!(DetachFromTargetParams => DetachFromTargetReturns, "Target.detachFromTarget");

/// Controls whether to automatically attach to new targets which are
/// considered to be directly related to this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAutoAttachParams {
    pub auto_attach: bool,
    /// Whether to pause new targets when attaching to them.
    pub wait_for_debugger_on_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten: Option<bool>,
}

impl SetAutoAttachParams {
    pub fn new(auto_attach: bool) -> Self {
        Self {
            auto_attach,
            wait_for_debugger_on_start: false,
            flatten: Some(true),
        }
    }

    pub fn wait_for_debugger_on_start(mut self, wait: bool) -> Self {
        self.wait_for_debugger_on_start = wait;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAutoAttachReturns {}

impl_command!(SetAutoAttachParams => SetAutoAttachReturns, "Target.setAutoAttach");

/// Issued when attached to target because of auto-attach or `attachToTarget`
/// command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttachedToTarget {
    /// Identifier assigned to the session used to send/receive messages.
    pub session_id: SessionId,
    pub target_info: TargetInfo,
    #[serde(default)]
    pub waiting_for_debugger: bool,
}

impl_event!(EventAttachedToTarget, "Target.attachedToTarget");

/// Issued when detached from target for any reason (including
/// `detachFromTarget` command). Can be issued multiple times per target if
/// multiple sessions have been attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetachedFromTarget {
    pub session_id: SessionId,
    /// Deprecated by the protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<TargetId>,
}

impl_event!(EventDetachedFromTarget, "Target.detachedFromTarget");

/// Issued when a possible inspection target is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTargetCreated {
    pub target_info: TargetInfo,
}

impl_event!(EventTargetCreated, "Target.targetCreated");

/// Issued when a target is destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTargetDestroyed {
    pub target_id: TargetId,
}

impl_event!(EventTargetDestroyed, "Target.targetDestroyed");

/// The `Target` domain.
#[derive(Debug, Clone)]
pub struct Target {
    client: Client,
}

impl Domain for Target {
    const NAME: &'static str = "Target";

    fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Target {
    pub async fn set_discover_targets(&self, discover: bool) -> Result<()> {
        self.client
            .execute(SetDiscoverTargetsParams::new(discover))
            .await?;
        Ok(())
    }

    pub async fn get_targets(&self) -> Result<Vec<TargetInfo>> {
        Ok(self
            .client
            .execute(GetTargetsParams::default())
            .await?
            .result
            .target_infos)
    }

    /// Attach to `target_id` in flat mode and return a handle addressing the
    /// new session.
    pub async fn attach_to_target(&self, target_id: impl Into<TargetId>) -> Result<TargetSession> {
        let resp = self
            .client
            .execute(AttachToTargetParams::new(target_id))
            .await?;
        Ok(self.client.session(resp.result.session_id))
    }

    pub async fn detach_from_target(&self, session_id: impl Into<SessionId>) -> Result<()> {
        self.client
            .execute(DetachFromTargetParams::new(session_id))
            .await?;
        Ok(())
    }

    pub async fn set_auto_attach(&self, params: SetAutoAttachParams) -> Result<()> {
        self.client.execute(params).await?;
        Ok(())
    }

    pub async fn attached_to_target(&self) -> Result<EventStream<EventAttachedToTarget>> {
        self.client.event_listener().await
    }

    pub async fn detached_from_target(&self) -> Result<EventStream<EventDetachedFromTarget>> {
        self.client.event_listener().await
    }

    pub async fn target_created(&self) -> Result<EventStream<EventTargetCreated>> {
        self.client.event_listener().await
    }

    pub async fn target_destroyed(&self) -> Result<EventStream<EventTargetDestroyed>> {
        self.client.event_listener().await
    }
}
