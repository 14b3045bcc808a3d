use std::collections::HashSet;
use std::time::Duration;

use cdp_client::domains::debugger::Debugger;
use cdp_client::domains::runtime::{EvaluateParams, Runtime};
use cdp_client::types::{CallId, CdpEventMessage, ProtocolError, Response};
use cdp_client::{CdpError, ConnectionState, HandlerConfig};
use futures::{FutureExt, StreamExt};
use serde_json::json;

mod common;

use common::{connect, connect_with_config, Harness};

#[tokio::test]
async fn concurrent_calls_get_unique_ids_and_their_own_response() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect();

    let calls: Vec<_> = (0..50)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call_command("Runtime.evaluate", Some(json!({ "i": i })), None)
                    .await
            })
        })
        .collect();

    let mut written = Vec::new();
    for _ in 0..50 {
        written.push(remote.next_call().await.unwrap());
    }
    let ids: HashSet<_> = written.iter().map(|call| call.id).collect();
    assert_eq!(ids.len(), 50);

    // answer in reverse order, echoing the params
    for call in written.iter().rev() {
        remote.respond(call.id, call.params.clone().unwrap());
    }

    for (i, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap().unwrap(), Some(json!({ "i": i })));
    }
}

#[tokio::test]
async fn evaluate_success() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect();

    let runtime = client.domain::<Runtime>();
    let eval = tokio::spawn(async move { runtime.evaluate("1+1").await });

    let call = remote.next_call().await.unwrap();
    assert_eq!(call.method, "Runtime.evaluate");
    assert_eq!(call.params, Some(json!({ "expression": "1+1" })));
    assert!(call.session_id.is_none());
    remote.respond(
        call.id,
        json!({"result": {"type": "number", "value": 2, "description": "2"}}),
    );

    let eval = eval.await.unwrap().unwrap();
    assert_eq!(eval.result.r#type, "number");
    assert_eq!(eval.result.value, Some(json!(2)));
    assert!(eval.exception_details.is_none());
}

#[tokio::test]
async fn evaluate_syntax_error() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect();

    let call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .call_command("Runtime.evaluate", Some(json!({"expression": "1+"})), None)
                .await
        }
    });

    let written = remote.next_call().await.unwrap();
    remote.respond_error(written.id, -32000, "SyntaxError: Unexpected end of input");

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(
        err.as_protocol_error(),
        Some(&ProtocolError::new(
            -32000,
            "SyntaxError: Unexpected end of input"
        ))
    );
    // the connection is unaffected
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn event_preceding_a_response_is_delivered_first() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect();

    let debugger = client.domain::<Debugger>();
    let mut paused = debugger.paused().await.unwrap();
    let enable = tokio::spawn({
        let debugger = debugger.clone();
        async move { debugger.enable().await }
    });

    let call = remote.next_call().await.unwrap();
    assert_eq!(call.method, "Debugger.enable");
    remote.emit(&CdpEventMessage::new(
        "Debugger.paused",
        Some(json!({"callFrames": [], "reason": "other"})),
    ));
    remote.respond(call.id, json!({"debuggerId": "D1"}));

    assert_eq!(enable.await.unwrap().unwrap(), "D1");
    let event = paused
        .next()
        .now_or_never()
        .flatten()
        .expect("event is queued before the response resolves");
    assert_eq!(event.reason, "other");
    assert!(event.call_frames.is_empty());
}

#[tokio::test]
async fn slow_subscriber_does_not_hold_back_others() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect();

    let mut fast = client.subscribe("Network.requestWillBeSent").await.unwrap();
    let mut slow = client.subscribe("Network.requestWillBeSent").await.unwrap();

    for n in 0..100 {
        remote.emit(&CdpEventMessage::new(
            "Network.requestWillBeSent",
            Some(json!({ "n": n })),
        ));
    }

    for n in 0..100 {
        let event = fast.next().await.unwrap();
        assert_eq!(event.params, Some(json!({ "n": n })));
    }

    // commands keep completing while `slow` has not read anything
    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Network.enable", None, None).await }
    });
    let written = remote.next_call().await.unwrap();
    remote.respond(written.id, json!({}));
    assert_eq!(call.await.unwrap().unwrap(), Some(json!({})));

    for n in 0..100 {
        let event = slow.next().await.unwrap();
        assert_eq!(event.params, Some(json!({ "n": n })));
    }
}

#[tokio::test]
async fn transport_end_fails_everything_in_flight() {
    let Harness {
        client,
        mut remote,
        handler,
    } = connect();

    let mut events = client.events().await.unwrap();
    let calls: Vec<_> = (0..3)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call_command("Runtime.evaluate", Some(json!({ "expression": i.to_string() })), None)
                    .await
            })
        })
        .collect();
    for _ in 0..3 {
        remote.next_call().await.unwrap();
    }

    remote.close();

    for call in calls {
        assert!(matches!(
            call.await.unwrap(),
            Err(CdpError::ConnectionClosed)
        ));
    }
    assert!(events.next().await.is_none());
    assert!(handler.await.unwrap().is_empty());
    assert_eq!(client.state(), ConnectionState::Closed);

    // fails at once, without a transport
    assert!(matches!(
        client.call_command("Runtime.enable", None, None).await,
        Err(CdpError::ConnectionClosed)
    ));
    assert!(matches!(client.events().await, Err(CdpError::ConnectionClosed)));
}

#[tokio::test]
async fn close_is_orderly_and_idempotent() {
    let Harness {
        client,
        mut remote,
        handler,
    } = connect();

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Debugger.enable", None, None).await }
    });
    remote.next_call().await.unwrap();
    let mut paused = client.subscribe("Debugger.paused").await.unwrap();

    client.close().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.is_closed());

    assert!(matches!(
        pending.await.unwrap(),
        Err(CdpError::ConnectionClosed)
    ));
    assert!(paused.next().await.is_none());
    // the transport was closed
    assert!(remote.next_frame().await.is_none());

    client.close().await.unwrap();
    assert!(handler.await.unwrap().is_empty());
    client.close().await.unwrap();
}

#[tokio::test]
async fn unknown_response_id_is_ignored() {
    let Harness {
        client,
        mut remote,
        handler,
    } = connect();

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Page.enable", None, None).await }
    });
    let written = remote.next_call().await.unwrap();

    remote.respond(CallId::new(written.id.inner() + 1000), json!({"stray": true}));
    remote.respond(written.id, json!({"ok": true}));
    // a duplicate of an already resolved response
    remote.respond(written.id, json!({"ok": false}));

    assert_eq!(call.await.unwrap().unwrap(), Some(json!({"ok": true})));

    client.close().await.unwrap();
    assert!(handler.await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_frames_are_isolated() {
    let Harness {
        client,
        mut remote,
        handler,
    } = connect();

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Page.enable", None, None).await }
    });
    let written = remote.next_call().await.unwrap();

    remote.send_raw("{\"id\":");
    remote.send_raw("[1, 2, 3]");
    remote.send_raw("{\"params\": {}}");
    remote.respond(written.id, json!({}));

    assert_eq!(call.await.unwrap().unwrap(), Some(json!({})));
    assert_eq!(client.state(), ConnectionState::Connected);

    client.close().await.unwrap();
    let errors = handler.await.unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors
        .iter()
        .all(|err| matches!(err, CdpError::Malformed(_))));
}

#[tokio::test]
async fn error_wins_over_result() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect();

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Page.reload", None, None).await }
    });
    let written = remote.next_call().await.unwrap();
    remote.send_response(&Response {
        id: written.id,
        result: Some(json!({})),
        error: Some(ProtocolError::new(-32601, "'Page.reload' wasn't found")),
    });

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err.as_protocol_error().map(|err| err.code), Some(-32601));
}

#[tokio::test]
async fn success_without_result() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect();

    let raw = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Runtime.enable", None, None).await }
    });
    let written = remote.next_call().await.unwrap();
    remote.send_raw(format!("{{\"id\":{}}}", written.id.inner()));
    assert_eq!(raw.await.unwrap().unwrap(), None);

    let typed = tokio::spawn({
        let client = client.clone();
        async move { client.execute(EvaluateParams::new("1")).await }
    });
    let written = remote.next_call().await.unwrap();
    remote.send_raw(format!("{{\"id\":{}}}", written.id.inner()));
    assert!(matches!(
        typed.await.unwrap(),
        Err(CdpError::NoResponse)
    ));
}

#[tokio::test]
async fn unanswered_call_times_out() {
    let Harness {
        client,
        mut remote,
        ..
    } = connect_with_config(HandlerConfig {
        request_timeout: Duration::from_millis(50),
        housekeeping_interval: Duration::from_millis(10),
        ..Default::default()
    });

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Debugger.pause", None, None).await }
    });
    remote.next_call().await.unwrap();

    assert!(matches!(call.await.unwrap(), Err(CdpError::Timeout)));
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn abandoned_call_does_not_disturb_later_calls() {
    let Harness {
        client,
        mut remote,
        handler,
    } = connect();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        client.call_command("Runtime.evaluate", Some(json!({"expression": "for(;;){}"})), None),
    )
    .await;
    assert!(abandoned.is_err());

    let first = remote.next_call().await.unwrap();
    // the late response finds nobody waiting
    remote.respond(first.id, json!({"result": {"type": "undefined"}}));

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_command("Runtime.enable", None, None).await }
    });
    let second = remote.next_call().await.unwrap();
    assert!(second.id > first.id);
    remote.respond(second.id, json!({}));
    assert_eq!(call.await.unwrap().unwrap(), Some(json!({})));

    client.close().await.unwrap();
    assert!(handler.await.unwrap().is_empty());
}
