//! Property-based round-trip coverage for the MessagePack codec, plus the
//! literal end-to-end scenarios the session is expected to satisfy.

use proptest::prelude::*;
use std::sync::Arc;
use wsrpc::codec::{de, ser, Value};
use wsrpc::session::RpcSession;
use wsrpc::transport::mock::{MockBehaviors, MockTransport};
use wsrpc::transport::{ClientConfig, Transport};

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|i| Value::Int(i as i64)),
        any::<f64>().prop_filter("finite only", |f| f.is_finite()).prop_map(Value::Float),
        ".*".prop_map(Value::Str),
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bin),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            proptest::collection::vec((".*", inner), 0..8).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn value_survives_encode_decode(v in arb_value()) {
        let encoded = ser::encode(&v).unwrap();
        let (decoded, consumed) = de::decode(&encoded).unwrap();
        prop_assert_eq!(consumed, encoded.len());
        prop_assert_eq!(decoded, v);
    }
}

fn test_config() -> ClientConfig {
    ClientConfig {
        request_timeout: std::time::Duration::from_millis(300),
        heartbeat_interval: None,
        heartbeat_method: "ping".to_string(),
        auto_reconnect: true,
        max_reconnect_attempts: 2,
        reconnect_interval: std::time::Duration::from_millis(5),
        protocols: Vec::new(),
        stats_window: 100,
        debug: false,
    }
}

#[tokio::test]
async fn request_success_scenario() {
    let transport = MockTransport::new(MockBehaviors::default());
    let captured = transport.clone();
    let connector = Arc::new(move |_: &str| Arc::new(captured.clone()) as Arc<dyn Transport>);
    let session = RpcSession::new("mock://t", connector, test_config());
    session.connect().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let session2 = session.clone();
    let task =
        tokio::spawn(async move { session2.request("sum", Value::Array(vec![Value::Int(2), Value::Int(3)]), None, None).await });
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let sent = transport.sent_frames();
    let (decoded, _) = de::decode(&sent[0]).unwrap();
    let Value::Map(members) = decoded else { panic!() };
    let Value::Str(id) = members.iter().find(|(k, _)| k == "id").unwrap().1.clone() else { panic!() };

    let response = Value::Map(vec![
        ("jsonrpc".into(), Value::Str("2.0".into())),
        ("id".into(), Value::Str(id)),
        ("result".into(), Value::Int(5)),
    ]);
    transport.push_message(ser::encode(&response).unwrap());

    assert_eq!(task.await.unwrap().unwrap(), Value::Int(5));
}

#[tokio::test]
async fn notification_scenario_requires_no_reply() {
    let transport = MockTransport::new(MockBehaviors::default());
    let captured = transport.clone();
    let connector = Arc::new(move |_: &str| Arc::new(captured.clone()) as Arc<dyn Transport>);
    let session = RpcSession::new("mock://t", connector, test_config());
    session.connect().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    session.notify("log", Value::Str("hello".into())).await.unwrap();
    let sent = transport.sent_frames();
    assert_eq!(sent.len(), 1);
    let (decoded, _) = de::decode(&sent[0]).unwrap();
    let Value::Map(members) = decoded else { panic!() };
    assert!(members.iter().all(|(k, _)| k != "id"));
}

#[tokio::test]
async fn stream_scenario_delivers_pushes_without_a_pending_request() {
    let transport = MockTransport::new(MockBehaviors::default());
    let captured = transport.clone();
    let connector = Arc::new(move |_: &str| Arc::new(captured.clone()) as Arc<dyn Transport>);
    let session = RpcSession::new("mock://t", connector, test_config());
    session.connect().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let received = Arc::new(std::sync::Mutex::new(Vec::new()));
    let r = received.clone();
    let controller = session.stream("prices", Value::Null, None, move |v| r.lock().unwrap().push(v)).await.unwrap();

    let sent = transport.sent_frames();
    let (decoded, _) = de::decode(&sent[0]).unwrap();
    let Value::Map(members) = decoded else { panic!() };
    let Value::Str(id) = members.iter().find(|(k, _)| k == "id").unwrap().1.clone() else { panic!() };
    assert_eq!(id, controller.id());

    for i in 0..3 {
        let push = Value::Map(vec![
            ("jsonrpc".into(), Value::Str("2.0".into())),
            ("id".into(), Value::Str(id.clone())),
            ("result".into(), Value::Int(i)),
        ]);
        transport.push_message(ser::encode(&push).unwrap());
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    assert_eq!(*received.lock().unwrap(), vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
    assert_eq!(session.get_stats().pending_requests, 0);
}

#[tokio::test]
async fn reconnect_scenario_reaches_open_again() {
    let transport = MockTransport::new(MockBehaviors::default());
    let captured = transport.clone();
    let connector = Arc::new(move |_: &str| Arc::new(captured.clone()) as Arc<dyn Transport>);
    let session = RpcSession::new("mock://t", connector, test_config());
    session.connect().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(session.state(), wsrpc::transport::ConnectionState::Open);

    transport.push_close(1006, "abnormal closure");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(session.get_stats().reconnect_count, 1);
    assert_eq!(session.state(), wsrpc::transport::ConnectionState::Open);
}
