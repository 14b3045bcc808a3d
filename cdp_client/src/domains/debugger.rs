//! Debugger domain exposes JavaScript debugging capabilities.

use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::Result;
use crate::listeners::EventStream;

use super::runtime::RemoteObject;
use super::Domain;

/// Location in the source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    /// Line number in the script (0-based).
    pub line_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(rename = "type")]
    pub r#type: String,
    pub object: RemoteObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// JavaScript call frame. Array of call frames form the call stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Call frame identifier, only valid while the virtual machine is paused.
    pub call_frame_id: String,
    /// Name of the JavaScript function called on this call frame.
    pub function_name: String,
    pub location: Location,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub scope_chain: Vec<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this: Option<RemoteObject>,
}

/// Enables debugger for the given page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableParams {
    /// The maximum size in bytes of collected scripts (not referenced by other
    /// heap objects) the virtual machine can hold in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scripts_cache_size: Option<f64>,
}

impl EnableParams {
    pub fn max_scripts_cache_size(mut self, size: f64) -> Self {
        self.max_scripts_cache_size = Some(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableReturns {
    /// Unique identifier of the debugger.
    pub debugger_id: String,
}

impl_command!(EnableParams => EnableReturns, "Debugger.enable");

/// Disables debugger for given page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableParams {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableReturns {}

impl_command!(DisableParams => DisableReturns, "Debugger.disable");

/// Stops on the next JavaScript statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseParams {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseReturns {}

impl_command!(PauseParams => PauseReturns, "Debugger.pause");

/// Resumes JavaScript execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeParams {
    /// Set to true to terminate execution upon resuming execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminate_on_resume: Option<bool>,
}

impl ResumeParams {
    pub fn terminate_on_resume(mut self, terminate: bool) -> Self {
        self.terminate_on_resume = Some(terminate);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReturns {}

impl_command!(ResumeParams => ResumeReturns, "Debugger.resume");

/// Fired when the virtual machine stopped on breakpoint or exception or any
/// other stop criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPaused {
    /// Call stack the virtual machine stopped on.
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
    /// Pause reason.
    pub reason: String,
    /// Object containing break-specific auxiliary properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Hit breakpoints IDs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_breakpoints: Option<Vec<String>>,
}

impl_event!(EventPaused, "Debugger.paused");

/// Fired when the virtual machine resumed execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResumed {}

impl_event!(EventResumed, "Debugger.resumed");

/// The `Debugger` domain.
#[derive(Debug, Clone)]
pub struct Debugger {
    client: Client,
}

impl Domain for Debugger {
    const NAME: &'static str = "Debugger";

    fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Debugger {
    /// Enable the debugger and return its unique identifier.
    pub async fn enable(&self) -> Result<String> {
        Ok(self
            .client
            .execute(EnableParams::default())
            .await?
            .result
            .debugger_id)
    }

    pub async fn disable(&self) -> Result<()> {
        self.client.execute(DisableParams::default()).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.client.execute(PauseParams::default()).await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.client.execute(ResumeParams::default()).await?;
        Ok(())
    }

    pub async fn paused(&self) -> Result<EventStream<EventPaused>> {
        self.client.event_listener().await
    }

    pub async fn resumed(&self) -> Result<EventStream<EventResumed>> {
        self.client.event_listener().await
    }
}
