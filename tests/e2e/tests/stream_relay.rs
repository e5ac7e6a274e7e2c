//! Output streams relaying to coordinator actors resolved through a registry

use e2e_tests::{init_test_tracing, start_coordinator};
use message_sink::{LazyConfig, LazyMessageSink};
use messaging_actors::{ActorRegistry, ActorSystem};
use output_stream::{OutputStream, RelayStats};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use stream_config::{ResolverSettings, StreamConfig, WriteYield};
use types::{Message, MessageId, MessageType, StreamId, Value};

const WAIT: Duration = Duration::from_secs(5);

fn token(index: usize) -> Value {
    Value::map([
        ("text", Value::from(format!("t{} ", index))),
        ("index", Value::from(index as i64)),
    ])
}

fn fast_config() -> StreamConfig {
    StreamConfig {
        write_yield: WriteYield::Disabled,
        resolver: ResolverSettings {
            max_retries: 0,
            retry_delay_ms: 1,
            connect_timeout_ms: 200,
            ..ResolverSettings::default()
        },
        ..StreamConfig::default()
    }
}

#[tokio::test]
async fn coordinator_sees_chunks_then_end_then_content() {
    init_test_tracing();
    let system = ActorSystem::new();
    let registry: ActorRegistry<Message> = ActorRegistry::new();
    let (_, log) = start_coordinator(&system, &registry, "coordinator").await.unwrap();

    let mut stream = OutputStream::builder("completion-1")
        .coordinator(registry.clone())
        .build()
        .unwrap();
    for i in 0..3 {
        stream.write(token(i)).await;
    }
    let output = stream.finalize().await.unwrap();

    assert!(log.wait_for_content(1, WAIT).await);
    assert_eq!(
        log.kinds_from("completion-1"),
        vec![
            MessageType::ContentStreamChunk,
            MessageType::ContentStreamChunk,
            MessageType::ContentStreamChunk,
            MessageType::ContentStreamEnd,
            MessageType::Content,
        ]
    );

    let received = log.messages();
    assert_eq!(received[4].content_value(), Some(&output));
    assert_eq!(output.get("text"), Some(&Value::from("t0 t1 t2 ")));
    assert!(received.iter().all(|m| m.receiver == "coordinator"));

    let wire = serde_json::to_value(&received[0]).unwrap();
    assert_eq!(wire["type"], "CONTENT_STREAM_CHUNK");
    assert_eq!(wire["sender"], "completion-1");
    assert_eq!(wire["data"]["chunk"]["text"], "t0 ");

    system.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_streams_keep_per_sender_order() {
    init_test_tracing();
    const STREAMS: usize = 16;
    const TOKENS: usize = 20;

    let system = ActorSystem::new();
    let registry: ActorRegistry<Message> = ActorRegistry::new();
    let (_, log) = start_coordinator(&system, &registry, "coordinator").await.unwrap();

    let producers: Vec<_> = (0..STREAMS)
        .map(|n| {
            let mut stream = OutputStream::builder(format!("stream-{}", n))
                .coordinator(registry.clone())
                .config(&StreamConfig::default())
                .build()
                .unwrap();
            tokio::spawn(async move {
                for i in 0..TOKENS {
                    stream.write(token(i)).await;
                }
                stream.finalize().await.unwrap()
            })
        })
        .collect();

    let mut outputs = Vec::new();
    for producer in producers {
        outputs.push(producer.await.unwrap());
    }
    assert!(log.wait_for_content(STREAMS, WAIT).await);

    let expected_text: String = (0..TOKENS).map(|i| format!("t{} ", i)).collect();
    for (n, output) in outputs.iter().enumerate() {
        let sender = format!("stream-{}", n);
        let received = log.from_sender(&sender);
        assert_eq!(received.len(), TOKENS + 2);

        let indexes: Vec<i64> = received[..TOKENS]
            .iter()
            .map(|m| match m.chunk_value().and_then(|c| c.get("index")) {
                Some(Value::Int(i)) => *i,
                other => panic!("unexpected chunk {:?}", other),
            })
            .collect();
        assert_eq!(indexes, (0..TOKENS as i64).collect::<Vec<_>>());

        assert_eq!(received[TOKENS].message_type, MessageType::ContentStreamEnd);
        assert_eq!(received[TOKENS + 1].content_value(), Some(output));
        assert_eq!(output.get("text"), Some(&Value::from(expected_text.as_str())));
    }

    system.shutdown().await;
}

#[tokio::test]
async fn unresolved_coordinator_degrades_to_counted_failures() {
    init_test_tracing();
    let system = ActorSystem::new();
    let registry: ActorRegistry<Message> = ActorRegistry::new();

    let mut stream = OutputStream::builder("orphan")
        .coordinator(registry.clone())
        .config(&fast_config())
        .build()
        .unwrap();

    stream.write(token(0)).await;
    stream.write(token(1)).await;
    assert_eq!(stream.get_data().and_then(|v| v.get("text")), Some(&Value::from("t0 t1 ")));

    let output = stream.finalize().await.unwrap();
    assert_eq!(output.get("text"), Some(&Value::from("t0 t1 ")));
    assert_eq!(stream.relay_stats(), RelayStats { relayed: 0, failed: 4 });

    // Failed resolution is retried on the next relay
    let (_, log) = start_coordinator(&system, &registry, "coordinator").await.unwrap();
    let late = Message::stream_end(MessageId::new(), &StreamId::new("orphan"), "coordinator");
    stream.write_raw(late.clone()).await.unwrap();

    assert!(log.wait_until(WAIT, |messages| !messages.is_empty()).await);
    assert_eq!(log.messages(), vec![late]);
    assert_eq!(stream.relay_stats(), RelayStats { relayed: 1, failed: 4 });

    system.shutdown().await;
}

#[tokio::test]
async fn stream_follows_a_restarted_coordinator() {
    init_test_tracing();
    let system = ActorSystem::new();
    let registry: ActorRegistry<Message> = ActorRegistry::new();
    let (first, first_log) = start_coordinator(&system, &registry, "coordinator").await.unwrap();

    let resolver = Arc::new(LazyMessageSink::coordinator(
        registry.clone(),
        "coordinator",
        LazyConfig::from(&fast_config().resolver),
    ));
    let mut stream = OutputStream::builder("long-running")
        .sink(resolver.clone())
        .write_yield(WriteYield::Disabled)
        .build()
        .unwrap();
    stream.write(token(0)).await;
    assert!(first_log.wait_until(WAIT, |messages| messages.len() == 1).await);

    system.stop(first.id()).await.unwrap();
    let (_, second_log) = start_coordinator(&system, &registry, "coordinator").await.unwrap();

    stream.write(token(1)).await;
    stream.finalize().await.unwrap();

    assert!(second_log.wait_for_content(1, WAIT).await);
    assert_eq!(
        second_log.kinds_from("long-running"),
        vec![
            MessageType::ContentStreamChunk,
            MessageType::ContentStreamEnd,
            MessageType::Content,
        ]
    );
    assert_eq!(first_log.count_of(MessageType::ContentStreamChunk), 1);
    assert_eq!(stream.relay_stats(), RelayStats { relayed: 4, failed: 0 });

    let metrics = resolver.lazy_metrics();
    assert_eq!(metrics.reconnection_attempts.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.successful_connects.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.messages_sent.load(Ordering::Relaxed), 4);
    assert_eq!(metrics.messages_failed.load(Ordering::Relaxed), 0);

    system.shutdown().await;
}

#[tokio::test]
async fn errors_reach_the_coordinator_mid_stream() {
    init_test_tracing();
    let system = ActorSystem::new();
    let registry: ActorRegistry<Message> = ActorRegistry::new();
    let (_, log) = start_coordinator(&system, &registry, "coordinator").await.unwrap();

    let mut stream = OutputStream::builder("flaky")
        .coordinator(registry.clone())
        .config(&fast_config())
        .build()
        .unwrap();
    stream.write(token(0)).await;
    stream.error("tool call failed").await;
    stream.write(token(1)).await;
    stream.finalize().await.unwrap();

    assert!(log.wait_for_content(1, WAIT).await);
    let errors: Vec<Message> = log
        .from_sender("flaky")
        .into_iter()
        .filter(|m| m.message_type == MessageType::Errors)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_messages(), vec!["tool call failed"]);
    assert_eq!(errors[0].id, Some(stream.message_id()));

    system.shutdown().await;
}
