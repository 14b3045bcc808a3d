use futures::channel::oneshot::Sender as OneshotSender;

use cdp_types::{Command, CommandResponse, Method, MethodId, Response};

use crate::domains::target::SessionId;
use crate::error::{CdpError, Result};

/// Deserialize a response
pub(crate) fn to_command_response<T: Command>(
    resp: Response,
    method: MethodId,
) -> Result<CommandResponse<T::Response>> {
    let id = resp.id;
    match resp.into_result()? {
        Some(res) => {
            let result = T::response_from_value(res)?;
            Ok(CommandResponse { id, result, method })
        }
        None => Err(CdpError::NoResponse),
    }
}

/// A command on its way to the handler, which assigns the id and writes it.
#[derive(Debug)]
pub struct CommandMessage<T = Result<Response>> {
    pub method: MethodId,
    pub session_id: Option<SessionId>,
    pub params: Option<serde_json::Value>,
    pub sender: OneshotSender<T>,
}

impl<T> CommandMessage<T> {
    pub fn new(
        method: impl Into<MethodId>,
        params: Option<serde_json::Value>,
        session_id: Option<SessionId>,
        sender: OneshotSender<T>,
    ) -> Self {
        Self {
            method: method.into(),
            session_id,
            params,
            sender,
        }
    }

    pub fn with_session<C: Command>(
        cmd: C,
        sender: OneshotSender<T>,
        session_id: Option<SessionId>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            method: cmd.identifier(),
            session_id,
            params: Some(serde_json::to_value(cmd)?),
            sender,
        })
    }
}

impl<T> Method for CommandMessage<T> {
    fn identifier(&self) -> MethodId {
        self.method.clone()
    }
}
