//! In-process stream connector for driving the connection manager by hand.

use crate::connection::{StreamConnector, TransportEventSink, TransportHandle};
use crate::credentials::CredentialPair;
use crate::error::AuthError;
use crate::events::LifecycleEvent;

use common::RedactedToken;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{broadcast, mpsc};

/// One `connect` call observed by [`MockConnector`].
pub struct OpenedTransport {
    pub access_token: String,
    pub sink: TransportEventSink,
    pub closed: Arc<AtomicBool>,
}

impl OpenedTransport {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockConnector {
    opened: mpsc::UnboundedSender<OpenedTransport>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OpenedTransport>) {
        let (opened, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { opened }), receiver)
    }
}

impl StreamConnector for MockConnector {
    fn connect(
        &self,
        access_token: &RedactedToken,
        events: TransportEventSink,
    ) -> Box<dyn TransportHandle> {
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.opened.send(OpenedTransport {
            access_token: access_token.expose().to_string(),
            sink: events,
            closed: Arc::clone(&closed),
        });
        Box::new(MockHandle { closed })
    }
}

struct MockHandle {
    closed: Arc<AtomicBool>,
}

impl TransportHandle for MockHandle {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn pair(access: &str, refresh: &str) -> CredentialPair {
    CredentialPair::new(access, refresh).unwrap()
}

/// Token factory handing out `{a1,r1}`, `{a2,r2}`, ... and counting its calls.
pub fn counting_factory() -> (
    impl Fn() -> futures_util::future::Ready<Result<CredentialPair, AuthError>> + Send + Sync + 'static,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let factory = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        futures_util::future::ready(Ok(pair(&format!("a{n}"), &format!("r{n}"))))
    };
    (factory, calls)
}

/// Next `ReconnectScheduled` delay, skipping every other event.
pub async fn next_scheduled_delay(
    events: &mut broadcast::Receiver<LifecycleEvent>,
) -> std::time::Duration {
    loop {
        if let LifecycleEvent::ReconnectScheduled { delay, .. } = events.recv().await.unwrap() {
            return delay;
        }
    }
}
