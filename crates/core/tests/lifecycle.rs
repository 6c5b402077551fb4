//! End-to-end lifecycle coverage over the fake transport: pairing,
//! readiness, disconnect-and-re-pair, and dispatch gating.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use mb::{
    AuthOutcome, Error, MessageDispatcher, PairingArtifactProducer, SessionLifecycleController,
    SessionRegistry, SessionState,
};
use mb_protocol::{ChatAddress, TenantId};
use mb_runtime::{FakeTransportController, FakeTransportFactory};

const WAIT: Duration = Duration::from_secs(2);

struct Hub {
    controller: Arc<SessionLifecycleController>,
    dispatcher: MessageDispatcher,
    registry: Arc<SessionRegistry>,
    fake: FakeTransportController,
    _tmp: tempfile::TempDir,
}

impl Hub {
    fn new() -> Self {
        let tmp = tempfile::TempDir::new().unwrap();
        let (factory, fake) = FakeTransportFactory::new();
        let registry = Arc::new(SessionRegistry::new());
        let producer = Arc::new(PairingArtifactProducer::new(
            tmp.path().join("pairing"),
            "http://localhost:3000",
        ));
        let controller = Arc::new(SessionLifecycleController::new(
            Arc::clone(&registry),
            Arc::new(factory),
            producer,
        ));
        let dispatcher = MessageDispatcher::new(Arc::clone(&registry));
        Self {
            controller,
            dispatcher,
            registry,
            fake,
            _tmp: tmp,
        }
    }

    async fn authenticate(&self, tenant: &TenantId) -> mb::Result<AuthOutcome> {
        timeout(WAIT, self.controller.authenticate(tenant))
            .await
            .expect("authenticate timed out")
    }

    /// Blocks until the tenant's session publishes `Ready`.
    async fn wait_ready(&self, tenant: &TenantId) {
        let session = self.registry.session(tenant).expect("session should exist");
        let mut state_rx = session.subscribe();
        timeout(WAIT, async {
            loop {
                if matches!(&*state_rx.borrow_and_update(), SessionState::Ready) {
                    return;
                }
                state_rx.changed().await.unwrap();
            }
        })
        .await
        .expect("session never became ready");
    }

    /// Blocks until the factory has seen `n` connects.
    async fn wait_connects(&self, n: usize) {
        timeout(WAIT, async {
            while self.fake.connect_count() < n {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected connect never happened");
    }
}

fn tenant(raw: &str) -> TenantId {
    TenantId::parse(raw).unwrap()
}

fn pairing_url(outcome: AuthOutcome) -> String {
    match outcome {
        AuthOutcome::Pairing(artifact) => artifact.url,
        AuthOutcome::Ready => panic!("expected a pairing artifact, got ready"),
    }
}

#[tokio::test]
async fn authenticate_new_tenant_returns_pairing_artifact() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_pairing(&t, "payload-1");

    let outcome = hub.authenticate(&t).await.unwrap();
    let AuthOutcome::Pairing(artifact) = outcome else {
        panic!("expected pairing outcome");
    };
    assert!(artifact.url.contains("/pairing/u1_pairing_"));
    assert!(artifact.image_path.exists());
    assert_eq!(hub.fake.connect_count(), 1);
    assert_eq!(hub.registry.active_count(), 1);
}

#[tokio::test]
async fn repeat_authenticate_returns_identical_artifact_without_reinit() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_pairing(&t, "payload-1");

    let first = pairing_url(hub.authenticate(&t).await.unwrap());
    let second = pairing_url(hub.authenticate(&t).await.unwrap());
    assert_eq!(first, second);
    assert_eq!(hub.fake.connect_count(), 1);
}

#[tokio::test]
async fn concurrent_authenticate_storm_initializes_once() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_pairing(&t, "payload-1");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&hub.controller);
            let t = t.clone();
            tokio::spawn(async move { controller.authenticate(&t).await })
        })
        .collect();

    let mut urls = Vec::new();
    for task in tasks {
        let outcome = timeout(WAIT, task).await.unwrap().unwrap().unwrap();
        urls.push(pairing_url(outcome));
    }

    // One transport initialization, one artifact, every caller sees it.
    assert_eq!(hub.fake.connect_count(), 1);
    assert!(urls.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(hub.registry.active_count(), 1);
}

#[tokio::test]
async fn pairing_completion_transitions_to_ready() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_pairing(&t, "payload-1");

    let _ = hub.authenticate(&t).await.unwrap();
    assert!(!hub.controller.verify(&t));

    hub.fake.emit_ready(&t);
    hub.wait_ready(&t).await;

    assert!(hub.controller.verify(&t));
    assert_eq!(hub.authenticate(&t).await.unwrap(), AuthOutcome::Ready);
    // Ready answers re-touch neither the factory nor the producer.
    assert_eq!(hub.fake.connect_count(), 1);

    let session = hub.registry.session(&t).unwrap();
    assert!(session.ready_at().is_some());
}

#[tokio::test]
async fn reused_credentials_go_straight_to_ready() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_ready(&t);

    assert_eq!(hub.authenticate(&t).await.unwrap(), AuthOutcome::Ready);
    assert!(hub.controller.verify(&t));
    assert_eq!(hub.fake.connect_count(), 1);
}

#[tokio::test]
async fn concurrent_waiter_resolves_when_ready_arrives_first() {
    let hub = Hub::new();
    let t = tenant("u1");

    let controller = Arc::clone(&hub.controller);
    let waiter = {
        let t = t.clone();
        tokio::spawn(async move { controller.authenticate(&t).await })
    };

    hub.wait_connects(1).await;
    hub.fake.emit_ready(&t);

    let outcome = timeout(WAIT, waiter).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, AuthOutcome::Ready);
}

#[tokio::test]
async fn connect_failure_surfaces_as_transport_init() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.fail_next_connect("driver exploded");

    let err = hub.authenticate(&t).await.unwrap_err();
    assert!(matches!(err, Error::TransportInit(ref m) if m.contains("driver exploded")));
    assert_eq!(hub.registry.active_count(), 0);

    // The failure is not sticky; a fresh authenticate pairs normally.
    hub.fake.emit_pairing(&t, "payload-1");
    let outcome = hub.authenticate(&t).await.unwrap();
    assert!(matches!(outcome, AuthOutcome::Pairing(_)));
}

#[tokio::test]
async fn transport_error_marks_failed_then_fresh_authenticate_repairs() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_error(&t, "bad auth");

    let err = hub.authenticate(&t).await.unwrap_err();
    assert!(matches!(err, Error::TransportInit(ref m) if m.contains("bad auth")));

    // The carcass is replaced by the next authenticate.
    let controller = Arc::clone(&hub.controller);
    let retry = {
        let t = t.clone();
        tokio::spawn(async move { controller.authenticate(&t).await })
    };
    hub.wait_connects(2).await;
    hub.fake.emit_pairing(&t, "payload-2");

    let outcome = timeout(WAIT, retry).await.unwrap().unwrap().unwrap();
    assert!(matches!(outcome, AuthOutcome::Pairing(_)));
    assert_eq!(hub.fake.destroy_count(&t), 1);
}

#[tokio::test]
async fn disconnect_unknown_tenant_is_not_found() {
    let hub = Hub::new();
    let err = hub.controller.disconnect(&tenant("ghost")).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
    assert_eq!(hub.registry.active_count(), 0);
    assert_eq!(hub.fake.connect_count(), 0);
}

#[tokio::test]
async fn disconnect_then_authenticate_issues_distinct_artifact() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_pairing(&t, "payload-1");

    let first = pairing_url(hub.authenticate(&t).await.unwrap());
    hub.fake.emit_ready(&t);
    hub.wait_ready(&t).await;

    let controller = Arc::clone(&hub.controller);
    let disconnect = {
        let t = t.clone();
        tokio::spawn(async move { controller.disconnect(&t).await })
    };
    hub.wait_connects(2).await;
    hub.fake.emit_pairing(&t, "payload-2");

    let outcome = timeout(WAIT, disconnect).await.unwrap().unwrap().unwrap();
    let second = pairing_url(outcome);
    assert_ne!(first, second);
    assert_eq!(hub.fake.destroy_count(&t), 1);
    assert!(!hub.controller.verify(&t));
}

#[tokio::test]
async fn send_requires_a_session() {
    let hub = Hub::new();
    let err = hub
        .dispatcher
        .send(&tenant("ghost"), "+1555", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
}

#[tokio::test]
async fn send_is_rejected_until_ready_then_dispatches() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_pairing(&t, "payload-1");
    let _ = hub.authenticate(&t).await.unwrap();

    // Dispatch only happens in Ready; AwaitingPairing is NotReady.
    let err = hub.dispatcher.send(&t, "+15551234567", "hi").await.unwrap_err();
    assert!(matches!(
        err,
        Error::NotReady {
            state: "awaiting_pairing",
            ..
        }
    ));

    hub.fake.emit_ready(&t);
    hub.wait_ready(&t).await;

    hub.dispatcher.send(&t, "+15551234567", "hi").await.unwrap();
    let sent = hub.fake.sent_messages(&t);
    assert_eq!(
        sent,
        vec![(
            ChatAddress::from_msisdn("+15551234567").unwrap(),
            "hi".to_string()
        )]
    );
}

#[tokio::test]
async fn send_after_disconnect_hits_the_unpaired_fresh_session() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_pairing(&t, "payload-1");
    let _ = hub.authenticate(&t).await.unwrap();
    hub.fake.emit_ready(&t);
    hub.wait_ready(&t).await;

    let controller = Arc::clone(&hub.controller);
    let disconnect = {
        let t = t.clone();
        tokio::spawn(async move { controller.disconnect(&t).await })
    };
    hub.wait_connects(2).await;
    hub.fake.emit_pairing(&t, "payload-2");
    timeout(WAIT, disconnect).await.unwrap().unwrap().unwrap();

    // Disconnect chains into a fresh unpaired session, so dispatch is
    // rejected as not-ready.
    let err = hub.dispatcher.send(&t, "+1555", "hi").await.unwrap_err();
    assert!(matches!(err, Error::NotReady { .. }));
}

#[tokio::test]
async fn ping_messages_are_answered_with_pong() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_ready(&t);
    let _ = hub.authenticate(&t).await.unwrap();
    hub.wait_ready(&t).await;

    let from = ChatAddress::from_msisdn("+4912345").unwrap();
    hub.fake.emit_message(&t, &from, "!ping");

    timeout(WAIT, async {
        loop {
            if !hub.fake.sent_messages(&t).is_empty() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ping was never answered");

    assert_eq!(
        hub.fake.sent_messages(&t),
        vec![(from, "pong".to_string())]
    );
}

#[tokio::test]
async fn invalid_destination_number_is_rejected() {
    let hub = Hub::new();
    let t = tenant("u1");
    hub.fake.emit_ready(&t);
    let _ = hub.authenticate(&t).await.unwrap();
    hub.wait_ready(&t).await;

    let err = hub.dispatcher.send(&t, "not-a-number", "hi").await.unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));
    assert!(hub.fake.sent_messages(&t).is_empty());
}
