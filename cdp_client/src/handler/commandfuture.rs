use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::{mpsc, oneshot};
use pin_project_lite::pin_project;

use cdp_types::Response;

use crate::cmd::CommandMessage;
use crate::error::{CdpError, Result};
use crate::handler::HandlerMessage;

pin_project! {
    /// Hands a command to the handler and waits for its response.
    ///
    /// Dropping the future abandons the call: the handler forgets it and a
    /// late response is discarded.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct CommandFuture {
        #[pin]
        rx_command: oneshot::Receiver<Result<Response>>,
        sender: mpsc::Sender<HandlerMessage>,
        // fails the call if no response arrives in time, even if the
        // handler is no longer polled
        #[pin]
        delay: futures_timer::Delay,

        message: Option<HandlerMessage>,
    }
}

impl CommandFuture {
    pub fn new(
        msg: CommandMessage,
        rx_command: oneshot::Receiver<Result<Response>>,
        sender: mpsc::Sender<HandlerMessage>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            rx_command,
            sender,
            delay: futures_timer::Delay::new(request_timeout),
            message: Some(HandlerMessage::Command(msg)),
        }
    }
}

impl Future for CommandFuture {
    type Output = Result<Response>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        if this.message.is_some() {
            match this.sender.poll_ready(cx) {
                Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
                Poll::Ready(Ok(_)) => match this.message.take() {
                    Some(message) => {
                        this.sender.start_send(message)?;
                        cx.waker().wake_by_ref();
                        Poll::Pending
                    }
                    None => Poll::Pending,
                },
                Poll::Pending => Poll::Pending,
            }
        } else {
            match this.rx_command.as_mut().poll(cx) {
                Poll::Ready(Ok(resp)) => Poll::Ready(resp),
                Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
                Poll::Pending => {
                    if this.delay.poll(cx).is_ready() {
                        Poll::Ready(Err(CdpError::Timeout))
                    } else {
                        Poll::Pending
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for CommandFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandFuture")
            .field("sent", &self.message.is_none())
            .finish()
    }
}
