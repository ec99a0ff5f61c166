use link_core::connection::{ConnectionManager, ReconnectPolicy, WebSocketConnector};
use link_core::credentials::CredentialPair;
use link_core::error::{AuthError, TransportError};
use link_core::events::{LifecycleBus, LifecycleEvent, StreamPayload};

use common::RedactedToken;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

// ============================================================================
// WebSocketConnector driven through ConnectionManager against a local server
// ============================================================================

const WAIT: Duration = Duration::from_secs(5);

/// Accepts stream connections, reports each query string, greets the client
/// and closes the first connection from the server side.
async fn spawn_stream_server() -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (queries_tx, queries_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut connection = 0;
        while let Ok((stream, _)) = listener.accept().await {
            connection += 1;
            let queries_tx = queries_tx.clone();
            tokio::spawn(async move {
                let mut query = String::new();
                let mut ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
                    query = req.uri().query().unwrap_or_default().to_string();
                    Ok::<_, ErrorResponse>(resp)
                })
                .await
                .expect("handshake");
                let _ = queries_tx.send(query);

                ws.send(Message::Text(format!("welcome {connection}").into()))
                    .await
                    .expect("send greeting");

                if connection == 1 {
                    let _ = ws.close(None).await;
                    return;
                }
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    (format!("ws://{addr}/stream"), queries_rx)
}

fn counting_factory() -> impl Fn() -> futures_util::future::Ready<Result<CredentialPair, AuthError>>
+ Send
+ Sync
+ 'static {
    let calls = Arc::new(AtomicUsize::new(0));
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        futures_util::future::ready(Ok(
            CredentialPair::new(format!("a{n}"), format!("r{n}")).expect("valid pair")
        ))
    }
}

async fn next_matching(
    events: &mut broadcast::Receiver<LifecycleEvent>,
    predicate: impl Fn(&LifecycleEvent) -> bool,
) -> LifecycleEvent {
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("bus open");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for lifecycle event")
}

/// **VALUE**: Verifies the whole stream path over a real WebSocket.
///
/// **WHY THIS MATTERS**: The mock-connector tests prove the state machine; this
/// proves the token reaches the server as the `token` query parameter, frames are
/// delivered, and a server-side close leads to a 500ms reconnect with a fresh token.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The token missing from the stream URL
/// - Text frames not being forwarded as messages
/// - A server close not being reported as a disconnect
#[tokio::test]
async fn given_stream_server_when_it_closes_then_reconnects_with_fresh_token() {
    // GIVEN: A stream server and a manager with a WebSocket connector
    let (url, mut queries) = spawn_stream_server().await;
    let connector = WebSocketConnector::new(&url).expect("valid url");
    let manager = ConnectionManager::new(
        Arc::new(connector),
        ReconnectPolicy::default(),
        LifecycleBus::new(64),
    );
    let mut events = manager.subscribe();

    // WHEN: Starting
    manager.start(Arc::new(counting_factory())).expect("start");

    // THEN: The server sees a1 and the greeting is published
    let first_query = timeout(WAIT, queries.recv()).await.unwrap().unwrap();
    assert_eq!(first_query, "token=a1");
    next_matching(&mut events, |e| matches!(e, LifecycleEvent::Connected { .. })).await;
    let greeting = next_matching(&mut events, |e| matches!(e, LifecycleEvent::Message(_))).await;
    assert_eq!(
        greeting,
        LifecycleEvent::Message(StreamPayload::Text("welcome 1".to_string()))
    );

    // THEN: The server-side close is reported and a reconnect scheduled after 500ms
    next_matching(&mut events, |e| matches!(e, LifecycleEvent::Disconnected { .. })).await;
    let scheduled = next_matching(&mut events, |e| {
        matches!(e, LifecycleEvent::ReconnectScheduled { .. })
    })
    .await;
    assert_eq!(
        scheduled,
        LifecycleEvent::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(500)
        }
    );

    // THEN: The reconnect uses a2
    let second_query = timeout(WAIT, queries.recv()).await.unwrap().unwrap();
    assert_eq!(second_query, "token=a2");
    next_matching(&mut events, |e| matches!(e, LifecycleEvent::Connected { .. })).await;

    manager.close().await;
}

#[tokio::test]
async fn given_nothing_listening_when_connecting_then_error_leads_to_reconnect() {
    // GIVEN: A port with no listener
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let connector = WebSocketConnector::new(&format!("ws://{addr}/stream")).unwrap();
    let manager = ConnectionManager::new(
        Arc::new(connector),
        ReconnectPolicy::default(),
        LifecycleBus::new(64),
    );
    let mut events = manager.subscribe();

    // WHEN: Starting
    manager.start(Arc::new(counting_factory())).unwrap();

    // THEN: The failed open is reported and retried with backoff
    let disconnected =
        next_matching(&mut events, |e| matches!(e, LifecycleEvent::Disconnected { .. })).await;
    if let LifecycleEvent::Disconnected { reason, .. } = disconnected {
        assert!(reason.contains("Connect Error"), "got {reason}");
    }
    next_matching(&mut events, |e| {
        matches!(e, LifecycleEvent::ReconnectScheduled { attempt: 1, .. })
    })
    .await;

    manager.close().await;
}

#[test]
fn given_non_websocket_url_when_creating_connector_then_invalid_url() {
    let result = WebSocketConnector::new("http://127.0.0.1:3000/");

    assert!(matches!(result, Err(TransportError::InvalidUrl { .. })));
    assert!(matches!(
        WebSocketConnector::new("not a url"),
        Err(TransportError::InvalidUrl { .. })
    ));
}

#[test]
fn given_access_token_when_building_endpoint_then_token_is_query_parameter() {
    let connector = WebSocketConnector::new("wss://stream.example.test/live?v=2").unwrap();
    let token = RedactedToken::new("abc+/=").unwrap();

    let endpoint = connector.endpoint_for(&token);

    assert_eq!(endpoint.path(), "/live");
    let pairs: Vec<(String, String)> = endpoint
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("v".to_string(), "2".to_string()),
            ("token".to_string(), "abc+/=".to_string()),
        ]
    );
}
