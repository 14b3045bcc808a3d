use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub type MethodId = Cow<'static, str>;

/// A Request sent by the client, identified by the `id`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    /// Identifier for this method call
    ///
    /// [`MethodCall`] id's must be unique for the lifetime of a connection
    pub id: CallId,
    /// The method identifier
    pub method: MethodId,
    /// The CDP session id of any
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    /// The payload of the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl MethodCall {
    /// Encode the call into the text frame written to the transport.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Method for MethodCall {
    fn identifier(&self) -> MethodId {
        self.method.clone()
    }
}

/// Identifier for a request send to the remote end
///
/// All requests (`MethodCall`) must contain a unique identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

impl CallId {
    /// Create a new id
    pub fn new(id: u64) -> Self {
        CallId(id)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }
}

/// Trait that all the request types have to implement.
pub trait Command: serde::ser::Serialize + Method {
    /// The type of the response this request triggers on the remote end
    type Response: serde::de::DeserializeOwned + fmt::Debug;

    /// deserialize the response from json
    fn response_from_value(response: serde_json::Value) -> serde_json::Result<Self::Response> {
        serde_json::from_value(response)
    }
}

/// A generic, successful, response of a request where the `result` has been
/// serialized into the `Command::Response` type.
#[derive(Debug)]
pub struct CommandResponse<T>
where
    T: fmt::Debug,
{
    pub id: CallId,
    pub result: T,
    pub method: MethodId,
}

impl<T: fmt::Debug> Deref for CommandResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

/// A received event where the `params` are kept as json
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct CdpEventMessage {
    /// Name of the method
    pub method: MethodId,
    /// The session this event is meant for.
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    /// Json payload of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl CdpEventMessage {
    pub fn new(method: impl Into<MethodId>, params: Option<serde_json::Value>) -> Self {
        Self {
            method: method.into(),
            session_id: None,
            params,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// The identifier of the session this event was meant for.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Deserialize the `params` into a typed event.
    ///
    /// Returns `None` if the event carried no `params`.
    pub fn decode_params<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.params
            .as_ref()
            .map(|params| T::deserialize(params))
    }
}

impl Method for CdpEventMessage {
    fn identifier(&self) -> MethodId {
        self.method.clone()
    }
}

/// `Method`s are message types that contain the field `method =
/// Self::identifier()` in their json body.
pub trait Method {
    /// The whole string identifier for this method like: `DOM.removeNode`
    fn identifier(&self) -> MethodId;

    /// The name of the domain this method belongs to: `DOM`
    fn domain_name(&self) -> MethodId {
        self.split().0
    }

    /// The standalone identifier of the method inside the domain: `removeNode`
    fn method_name(&self) -> MethodId {
        self.split().1
    }

    /// Tuple of (`domain_name`, `method_name`) : (`DOM`, `removeNode`)
    fn split(&self) -> (MethodId, MethodId) {
        match self.identifier() {
            Cow::Borrowed(id) => {
                let (domain, name) = split_method(id);
                (domain.into(), name.into())
            }
            Cow::Owned(id) => {
                let (domain, name) = split_method(&id);
                (Cow::Owned(domain.into()), Cow::Owned(name.into()))
            }
        }
    }
}

fn split_method(id: &str) -> (&str, &str) {
    id.split_once('.').unwrap_or((id, ""))
}

/// A trait that identifies a method on type level
pub trait MethodType {
    /// The identifier for this event's `method` field
    fn method_id() -> MethodId
    where
        Self: Sized;
}

/// A response to a [`MethodCall`] from the remote end
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Response {
    /// Numeric identifier for the exact request
    pub id: CallId,
    /// The response payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// The Reason why the [`MethodCall`] failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

impl Response {
    pub fn success(id: CallId, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: CallId, error: ProtocolError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Split the response into its outcome.
    ///
    /// An `error` always wins over a `result`; a success without a `result`
    /// yields `Ok(None)`.
    pub fn into_result(self) -> Result<Option<serde_json::Value>, ProtocolError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result),
        }
    }
}

/// An incoming message read from the transport: a command (never expected
/// inbound), a response to a previously submitted `MethodCall` identified by
/// its `id`, or an event emitted by the remote end.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Message {
    /// A command envelope, only ever sent by a client
    Command(MethodCall),
    /// A response for a request
    Response(Response),
    /// An emitted event from the server
    Event(CdpEventMessage),
}

/// Every field any envelope may carry; `decode` picks the shape.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: Option<CallId>,
    #[serde(default)]
    method: Option<MethodId>,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
    #[serde(default)]
    params: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<ProtocolError>,
}

impl Message {
    /// Decode a raw text frame into one of the three envelope shapes.
    ///
    /// `id` and `method` make a command, `id` alone a response, `method`
    /// alone an event.
    pub fn decode(text: &str) -> Result<Self, MalformedMessage> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|err| MalformedMessage::Invalid(err.to_string()))?;

        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Ok(Message::Command(MethodCall {
                id,
                method,
                session_id: raw.session_id,
                params: raw.params,
            })),
            (Some(id), None) => Ok(Message::Response(Response {
                id,
                result: raw.result,
                error: raw.error,
            })),
            (None, Some(method)) => Ok(Message::Event(CdpEventMessage {
                method,
                session_id: raw.session_id,
                params: raw.params,
            })),
            (None, None) => Err(MalformedMessage::Unrecognized),
        }
    }

    /// The call id, if this message carries one.
    pub fn id(&self) -> Option<CallId> {
        match self {
            Message::Command(call) => Some(call.id),
            Message::Response(resp) => Some(resp.id),
            Message::Event(_) => None,
        }
    }
}

/// An inbound frame that is not a recognized envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    /// Not valid json, not an object, or a field of the wrong type.
    Invalid(String),
    /// A json object carrying neither `id` nor `method`.
    Unrecognized,
}

impl fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedMessage::Invalid(reason) => write!(f, "Malformed message: {reason}"),
            MalformedMessage::Unrecognized => {
                f.write_str("Malformed message: neither `id` nor `method` present")
            }
        }
    }
}

impl std::error::Error for MalformedMessage {}

/// Represents the error type emitted by the remote end for failed
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Error code
    pub code: i64,
    /// Error Message
    pub message: String,
    /// Additional detail some backends attach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProtocolError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProtocolError {}
