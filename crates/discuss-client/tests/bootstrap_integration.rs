use std::sync::Arc;
use std::time::Duration;

use discuss_client::models::{DISCUSS_APP, MESSAGE, PERSONA, THREAD};
use discuss_client::rpc::mock::{MockMessagingRpc, RpcCall};
use discuss_client::{
    BootstrapState, ClientConfig, ClientError, Messaging, RouteContext, RpcError, SessionInfo,
    build_store,
};
use discuss_store::{RecordKey, StoreError};
use serde_json::{Value, json};

fn session() -> SessionInfo {
    SessionInfo {
        partner_id: 3,
        is_admin: true,
    }
}

fn messaging(rpc: Arc<MockMessagingRpc>, route: RouteContext) -> Arc<Messaging> {
    Arc::new(
        Messaging::new(
            build_store().unwrap(),
            rpc,
            &session(),
            route,
            ClientConfig::default(),
        )
        .unwrap(),
    )
}

fn snapshot() -> Value {
    json!({
        "Thread": [{
            "id": 10,
            "name": "general",
            "category": "channels",
            "correspondent": {"id": 44, "name": "Marc Demo"},
            "messages": [{"id": 900, "body": "hello", "author": {"id": 44}, "thread": 10}],
        }],
        "Persona": [{"id": 45, "name": "Mitchell Admin", "email": "admin@example.com"}],
        "menu_id": 7,
        "starred_counter": 2,
        "needaction_inbox_counter": 5,
        "history_counter": 1,
    })
}

#[tokio::test]
async fn construction_seeds_session_and_mailboxes() {
    let rpc = Arc::new(MockMessagingRpc::new());
    let messaging = messaging(rpc.clone(), RouteContext::default());
    assert_eq!(messaging.state(), BootstrapState::Uninitialized);
    assert!(!messaging.is_ready());
    assert!(rpc.calls().is_empty());

    messaging.with_store(|store| {
        let me = store.registry(PERSONA).unwrap().get(&RecordKey::from(3)).unwrap();
        assert_eq!(me.text("type"), Some("partner"));
        assert_eq!(me.scalar("isAdmin"), Some(&json!(true)));

        let app = store.record(store.singleton(DISCUSS_APP).unwrap()).unwrap();
        for (field, name) in [("inbox", "Inbox"), ("starred", "Starred"), ("history", "History")] {
            let mailbox = store.record(app.one(field).unwrap()).unwrap();
            assert_eq!(mailbox.key(), &RecordKey::from(field));
            assert_eq!(mailbox.text("model"), Some("mail.box"));
            assert_eq!(mailbox.text("name"), Some(name));
            assert_eq!(mailbox.scalar("counter"), Some(&json!(0)));
        }
    });
}

#[tokio::test]
async fn bootstrap_merges_nested_snapshot_and_settles_gate() {
    let rpc = Arc::new(MockMessagingRpc::with_snapshot(snapshot()));
    let messaging = messaging(rpc.clone(), RouteContext::from_hash("menu_id=7"));

    let early = {
        let messaging = messaging.clone();
        tokio::spawn(async move { messaging.ready().await })
    };
    let payload = messaging.initialize().await.unwrap();
    assert_eq!(payload["menu_id"], json!(7));
    assert_eq!(messaging.state(), BootstrapState::Ready);
    assert!(messaging.is_ready());
    assert_eq!(rpc.calls(), vec![RpcCall::InitMessaging]);

    let early = early.await.unwrap().unwrap();
    let late = messaging.ready().await.unwrap();
    assert!(Arc::ptr_eq(&early, &late));

    messaging.with_store(|store| {
        let thread = store.registry(THREAD).unwrap().get(&RecordKey::from(10)).unwrap();
        let persona = store.registry(PERSONA).unwrap().get(&RecordKey::from(44)).unwrap();
        assert_eq!(thread.one("correspondent"), Some(persona.id()));
        assert_eq!(persona.text("name"), Some("Marc Demo"));

        let message = store.registry(MESSAGE).unwrap().get(&RecordKey::from(900)).unwrap();
        assert_eq!(message.one("thread"), Some(thread.id()));
        assert_eq!(message.one("author"), Some(persona.id()));
        assert!(thread.many("messages").unwrap().contains(&message.id()));

        let app = store.record(store.singleton(DISCUSS_APP).unwrap()).unwrap();
        assert_eq!(app.scalar("isActive"), Some(&json!(true)));
        let channels = store.record(app.one("channels").unwrap()).unwrap();
        assert!(channels.many("threads").unwrap().contains(&thread.id()));

        let counter = |key: &str| {
            store
                .registry(THREAD)
                .unwrap()
                .get(&RecordKey::from(key))
                .unwrap()
                .scalar("counter")
                .cloned()
        };
        assert_eq!(counter("inbox"), Some(json!(5)));
        assert_eq!(counter("starred"), Some(json!(2)));
        assert_eq!(counter("history"), Some(json!(1)));
    });
}

#[tokio::test]
async fn discuss_inactive_when_route_differs() {
    let rpc = Arc::new(MockMessagingRpc::with_snapshot(snapshot()));
    let messaging = messaging(rpc, RouteContext::from_hash("menu_id=8&action=contacts"));
    messaging.initialize().await.unwrap();
    let app = messaging.discuss().unwrap();
    messaging.with_store(|store| {
        assert_eq!(store.record(app).unwrap().scalar("isActive"), Some(&json!(false)));
    });
}

#[tokio::test]
async fn discuss_action_activates_without_menu_match() {
    let rpc = Arc::new(MockMessagingRpc::with_snapshot(json!({"menu_id": 99})));
    let messaging = messaging(rpc, RouteContext::from_hash("action=mail.action_discuss"));
    messaging.initialize().await.unwrap();
    let app = messaging.discuss().unwrap();
    messaging.with_store(|store| {
        assert_eq!(store.record(app).unwrap().scalar("isActive"), Some(&json!(true)));
    });
}

#[tokio::test]
async fn failed_fetch_leaves_gate_pending() {
    let rpc = Arc::new(MockMessagingRpc::new());
    rpc.push_init(Err(RpcError::Transport("connection refused".into())));
    let messaging = messaging(rpc.clone(), RouteContext::default());

    let err = messaging.initialize().await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc(RpcError::Transport(_))));
    assert_eq!(messaging.state(), BootstrapState::Uninitialized);
    assert!(!messaging.is_ready());
    assert!(!messaging.gate().is_settled());
    let waited = tokio::time::timeout(Duration::from_millis(20), messaging.ready()).await;
    assert!(waited.is_err(), "readiness must stay pending");

    // A caller-driven second attempt may still succeed.
    rpc.push_init(Ok(snapshot()));
    messaging.initialize().await.unwrap();
    assert!(messaging.is_ready());
}

#[tokio::test]
async fn snapshot_with_unknown_model_is_rejected_without_settling() {
    let rpc = Arc::new(MockMessagingRpc::with_snapshot(json!({
        "Thread": [{"id": 1, "name": "kept out"}],
        "Channel": [{"id": 1}],
    })));
    let messaging = messaging(rpc, RouteContext::default());
    let err = messaging.initialize().await.unwrap_err();
    assert!(matches!(err, ClientError::Store(StoreError::UnknownModel(_))));
    assert!(!messaging.gate().is_settled());
    messaging.with_store(|store| {
        assert!(store.registry(THREAD).unwrap().get(&RecordKey::from(1)).is_none());
    });
}

#[tokio::test]
async fn initialize_runs_once() {
    let rpc = Arc::new(MockMessagingRpc::with_snapshot(snapshot()));
    let messaging = messaging(rpc.clone(), RouteContext::default());
    messaging.initialize().await.unwrap();
    assert!(matches!(
        messaging.initialize().await,
        Err(ClientError::AlreadyStarted("ready"))
    ));
    assert_eq!(rpc.calls().len(), 1);
}
