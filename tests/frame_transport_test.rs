//! Frame transport delivery tests
//!
//! Drives the bounded frame queue over the recording channel:
//! - Immediate flush order and header/payload pairing
//! - Drop-oldest eviction under backpressure
//! - Serialized flush passes
//! - Batched delivery on a full batch or on the timer
//! - Send failures and recovery

use splatcam::testing::{synthetic_frame, RecordingChannel};
use splatcam::transport::{ChannelMessage, DeliveryPolicy, FrameTransport, StreamOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn transport(options: StreamOptions) -> (FrameTransport<RecordingChannel>, RecordingChannel) {
    let channel = RecordingChannel::new();
    (FrameTransport::new(Arc::new(channel.clone()), options), channel)
}

async fn wait_for_sent(transport: &FrameTransport<RecordingChannel>, count: u64) {
    timeout(Duration::from_secs(5), async {
        while transport.stats().sent < count {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("frames should be delivered");
}

#[tokio::test]
async fn test_immediate_delivery_preserves_order() {
    let (transport, channel) = transport(StreamOptions::default());
    assert_eq!(transport.policy(), DeliveryPolicy::Immediate { batch_size: 1 });

    for seq in 0..5 {
        assert!(transport.enqueue(synthetic_frame(seq, 6)));
        tokio::task::yield_now().await;
    }
    wait_for_sent(&transport, 5).await;

    let messages = channel.messages();
    assert_eq!(messages.len(), 10);
    for (i, pair) in messages.chunks(2).enumerate() {
        let ChannelMessage::Text(header) = &pair[0] else {
            panic!("expected header at {}", i * 2);
        };
        let ChannelMessage::Binary(payload) = &pair[1] else {
            panic!("expected payload at {}", i * 2 + 1);
        };
        let header: serde_json::Value = serde_json::from_str(header).unwrap();
        assert_eq!(header["type"], "frame");
        assert_eq!(header["ts"], 1_700_000_000_000i64 + i as i64);
        assert_eq!(header["size"], payload.len());
        assert_eq!(payload.as_ref(), vec![i as u8; 6].as_slice());
    }
    assert_eq!(transport.queued(), 0);
}

#[tokio::test]
async fn test_full_queue_drops_oldest() {
    let (transport, channel) = transport(StreamOptions {
        max_queue_size: 3,
        ..Default::default()
    });

    // No await between enqueues: the flush task only runs afterwards.
    for seq in 0..10 {
        transport.enqueue(synthetic_frame(seq, 4));
    }
    assert_eq!(transport.queued(), 3);
    assert_eq!(transport.stats().dropped_backpressure, 7);

    wait_for_sent(&transport, 3).await;
    assert_eq!(
        channel.binary_messages(),
        vec![vec![7u8; 4], vec![8u8; 4], vec![9u8; 4]]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_flush_passes_never_overlap() {
    let (transport, channel) = transport(StreamOptions {
        max_queue_size: 100,
        batch_size: 2,
        ..Default::default()
    });
    channel.set_send_delay(Duration::from_millis(5));

    let mut producers = Vec::new();
    for worker in 0..4u64 {
        let transport = transport.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..5u64 {
                transport.enqueue(synthetic_frame(worker * 10 + i, 16));
                sleep(Duration::from_millis(3)).await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    wait_for_sent(&transport, 20).await;

    assert_eq!(channel.max_concurrent_sends(), 1);
    let messages = channel.messages();
    assert_eq!(messages.len(), 40);
    for pair in messages.chunks(2) {
        assert!(matches!(pair[0], ChannelMessage::Text(_)));
        assert!(matches!(pair[1], ChannelMessage::Binary(_)));
    }
}

#[tokio::test]
async fn test_full_batch_flushes_before_timer() {
    let (transport, channel) = transport(StreamOptions {
        max_queue_size: 50,
        batch_size: 3,
        batch_interval_ms: 10_000,
    });

    transport.enqueue(synthetic_frame(0, 4));
    transport.enqueue(synthetic_frame(1, 4));
    assert!(transport.has_pending_timer());
    sleep(Duration::from_millis(100)).await;
    assert_eq!(channel.send_attempts(), 0, "a partial batch waits");

    transport.enqueue(synthetic_frame(2, 4));
    wait_for_sent(&transport, 3).await;
    assert!(!transport.has_pending_timer());
    assert_eq!(transport.queued(), 0);

    // Two full batches go out at once, the remainder waits for the timer.
    for seq in 3..10 {
        transport.enqueue(synthetic_frame(seq, 4));
    }
    wait_for_sent(&transport, 9).await;
    sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.stats().sent, 9);
    assert_eq!(transport.queued(), 1);
    assert!(transport.has_pending_timer());

    let payloads = channel.binary_messages();
    let expected: Vec<Vec<u8>> = (0..9u8).map(|seq| vec![seq; 4]).collect();
    assert_eq!(payloads, expected);
    transport.shutdown();
}

#[tokio::test]
async fn test_partial_batch_sent_when_timer_fires() {
    let (transport, channel) = transport(StreamOptions {
        max_queue_size: 50,
        batch_size: 3,
        batch_interval_ms: 200,
    });

    transport.enqueue(synthetic_frame(0, 4));
    transport.enqueue(synthetic_frame(1, 4));
    assert!(transport.has_pending_timer());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(channel.send_attempts(), 0, "nothing sent before the interval");

    wait_for_sent(&transport, 2).await;
    sleep(Duration::from_millis(20)).await;
    assert!(!transport.has_pending_timer());
    assert_eq!(transport.queued(), 0);
}

#[tokio::test]
async fn test_send_failure_abandons_rest_of_batch() {
    let (transport, channel) = transport(StreamOptions {
        batch_size: 3,
        ..Default::default()
    });
    // Header and payload of the first frame go through, then sends fail.
    channel.fail_after(2);

    for seq in 0..3 {
        transport.enqueue(synthetic_frame(seq, 4));
    }
    timeout(Duration::from_secs(5), async {
        while transport.stats().lost_on_send_failure < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("failure should be recorded");

    let stats = transport.stats();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.lost_on_send_failure, 2);
    assert_eq!(stats.queued, 0);

    channel.heal();
    transport.enqueue(synthetic_frame(9, 4));
    wait_for_sent(&transport, 2).await;
    assert_eq!(channel.binary_messages(), vec![vec![0u8; 4], vec![9u8; 4]]);
}

#[tokio::test]
async fn test_frames_dropped_until_channel_ready() {
    let (transport, channel) = transport(StreamOptions::default());
    channel.set_ready(false);

    assert!(!transport.enqueue(synthetic_frame(0, 4)));
    assert!(!transport.enqueue(synthetic_frame(1, 4)));

    channel.set_ready(true);
    assert!(transport.enqueue(synthetic_frame(2, 4)));
    wait_for_sent(&transport, 1).await;

    let stats = transport.stats();
    assert_eq!(stats.dropped_not_ready, 2);
    assert_eq!(channel.binary_messages(), vec![vec![2u8; 4]]);
}

#[tokio::test]
async fn test_cancel_timer_keeps_frames_queued() {
    let (transport, channel) = transport(StreamOptions {
        max_queue_size: 10,
        batch_size: 2,
        batch_interval_ms: 50,
    });
    transport.enqueue(synthetic_frame(0, 4));
    transport.cancel_timer();
    assert!(!transport.has_pending_timer());

    sleep(Duration::from_millis(150)).await;
    assert_eq!(channel.send_attempts(), 0);
    assert_eq!(transport.queued(), 1);

    assert_eq!(transport.flush().await, 1);
    assert_eq!(transport.clear(), 0);
}
