//! Runtime domain exposes JavaScript runtime by means of remote evaluation and
//! mirror objects.

use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::Result;
use crate::listeners::EventStream;

use super::Domain;

/// Id of an execution context.
pub type ExecutionContextId = i64;

/// Mirror object referencing original JavaScript object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// Object type.
    #[serde(rename = "type")]
    pub r#type: String,
    /// Object subtype hint. Specified for `object` type values only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Remote object value in case of primitive values or JSON values (if it
    /// was requested).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Primitive value which can not be JSON-stringified does not have `value`,
    /// but gets this property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unique object identifier (for non-primitive values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

/// Detailed information about exception (or error) that was thrown during
/// script compilation or execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub exception_id: i64,
    pub text: String,
    pub line_number: i64,
    pub column_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_context_id: Option<ExecutionContextId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContextDescription {
    pub id: ExecutionContextId,
    pub origin: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_data: Option<serde_json::Value>,
}

/// Enables reporting of execution contexts creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableParams {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableReturns {}

impl_command!(EnableParams => EnableReturns, "Runtime.enable");

/// Disables reporting of execution contexts creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableParams {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableReturns {}

impl_command!(DisableParams => DisableReturns, "Runtime.disable");

/// Evaluates expression on global object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    /// Expression to evaluate.
    pub expression: String,
    /// Symbolic group name that can be used to release multiple objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    /// Determines whether Command Line API should be available during the
    /// evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_command_line_api: Option<bool>,
    /// In silent mode exceptions thrown during evaluation are not reported and
    /// do not pause execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ExecutionContextId>,
    /// Whether the result is expected to be a JSON object that should be sent
    /// by value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_preview: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_gesture: Option<bool>,
    /// Whether execution should `await` for resulting value and return once
    /// awaited promise is resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throw_on_side_effect: Option<bool>,
    /// Terminate execution after timing out (number of milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl EvaluateParams {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn object_group(mut self, object_group: impl Into<String>) -> Self {
        self.object_group = Some(object_group.into());
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    pub fn context_id(mut self, context_id: ExecutionContextId) -> Self {
        self.context_id = Some(context_id);
        self
    }

    pub fn return_by_value(mut self, return_by_value: bool) -> Self {
        self.return_by_value = Some(return_by_value);
        self
    }

    pub fn await_promise(mut self, await_promise: bool) -> Self {
        self.await_promise = Some(await_promise);
        self
    }

    pub fn timeout(mut self, timeout: f64) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<T: Into<String>> From<T> for EvaluateParams {
    fn from(expr: T) -> Self {
        EvaluateParams::new(expr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateReturns {
    /// Evaluation result.
    pub result: RemoteObject,
    /// Exception details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

impl_command!(EvaluateParams => EvaluateReturns, "Runtime.evaluate");

/// Issued when console API was called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConsoleApiCalled {
    /// Type of the call.
    #[serde(rename = "type")]
    pub r#type: String,
    /// Call arguments.
    pub args: Vec<RemoteObject>,
    pub execution_context_id: ExecutionContextId,
    /// Call timestamp.
    pub timestamp: f64,
}

impl_event!(EventConsoleApiCalled, "Runtime.consoleAPICalled");

/// Issued when new execution context is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventExecutionContextCreated {
    /// A newly created execution context.
    pub context: ExecutionContextDescription,
}

impl_event!(EventExecutionContextCreated, "Runtime.executionContextCreated");

/// The `Runtime` domain.
#[derive(Debug, Clone)]
pub struct Runtime {
    client: Client,
}

impl Domain for Runtime {
    const NAME: &'static str = "Runtime";

    fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Runtime {
    pub async fn enable(&self) -> Result<()> {
        self.client.execute(EnableParams::default()).await?;
        Ok(())
    }

    pub async fn disable(&self) -> Result<()> {
        self.client.execute(DisableParams::default()).await?;
        Ok(())
    }

    /// Evaluate an expression on the global object.
    ///
    /// A thrown exception is part of the returns, not an error.
    pub async fn evaluate(&self, params: impl Into<EvaluateParams>) -> Result<EvaluateReturns> {
        Ok(self.client.execute(params.into()).await?.result)
    }

    pub async fn console_api_called(&self) -> Result<EventStream<EventConsoleApiCalled>> {
        self.client.event_listener().await
    }

    pub async fn execution_context_created(
        &self,
    ) -> Result<EventStream<EventExecutionContextCreated>> {
        self.client.event_listener().await
    }
}
