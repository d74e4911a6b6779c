//! End-to-end broadcaster scenarios: fan-out correctness and slow-consumer
//! isolation.

use everwave::audio::Frame;
use everwave::stream::Broadcaster;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn frame_of(samples: &[i16]) -> Frame {
    samples.into()
}

#[tokio::test]
async fn fan_out_delivers_every_frame_to_every_listener() {
    let broadcaster = Arc::new(Broadcaster::new());
    let cancel = CancellationToken::new();
    let (source_tx, source_rx) = mpsc::channel(8);

    let mut first = broadcaster.subscribe();
    let mut second = broadcaster.subscribe();
    assert_eq!(broadcaster.listener_count(), 2);

    let runner = {
        let broadcaster = broadcaster.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { broadcaster.run(cancel, source_rx).await })
    };

    let frames = [
        frame_of(&[1, 2]),
        frame_of(&[3, 4]),
        frame_of(&[5, 6]),
    ];
    for frame in &frames {
        source_tx.send(frame.clone()).await.unwrap();
    }
    drop(source_tx); // closing the source ends the broadcast run

    runner.await.unwrap();

    for listener in [&mut first, &mut second] {
        let mut received = Vec::new();
        while let Ok(frame) = listener.frames.try_recv() {
            received.push(frame);
        }
        assert_eq!(received.len(), 3);
        assert_eq!(&received[0][..], &[1, 2]);
        assert_eq!(&received[1][..], &[3, 4]);
        assert_eq!(&received[2][..], &[5, 6]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_consumer_never_stalls_the_fast_one() {
    const TOTAL: i16 = 200;
    const LISTENER_CAP: usize = 150;

    let broadcaster = Arc::new(Broadcaster::new());
    let cancel = CancellationToken::new();
    let (source_tx, source_rx) = mpsc::channel(TOTAL as usize);

    let mut fast = broadcaster.subscribe();
    let fast_id = fast.id();
    // The slow listener never reads its queue at all.
    let mut slow = broadcaster.subscribe();

    let runner = {
        let broadcaster = broadcaster.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { broadcaster.run(cancel, source_rx).await })
    };

    // Fast consumer drains continuously on its own task.
    let drain = tokio::spawn(async move {
        let mut received: Vec<i16> = Vec::new();
        while let Some(frame) = fast.frames.recv().await {
            received.push(frame[0]);
        }
        received
    });

    // Feed 200 single-element frames; none of these sends may block for
    // long because the broadcaster drops instead of waiting.
    let feed = async {
        for i in 0..TOTAL {
            source_tx.send(frame_of(&[i])).await.unwrap();
            tokio::task::yield_now().await;
        }
        drop(source_tx);
    };
    tokio::time::timeout(Duration::from_secs(5), feed)
        .await
        .expect("source must never be blocked by a slow listener");

    runner.await.unwrap();
    // Let the drain task catch up, then close its channel by unsubscribing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    broadcaster.unsubscribe(fast_id);

    let received = match tokio::time::timeout(Duration::from_secs(1), drain).await {
        Ok(received) => received.unwrap(),
        Err(_) => panic!("fast consumer never finished draining"),
    };

    // The fast consumer kept up with (nearly) everything.
    assert!(
        received.len() > LISTENER_CAP,
        "fast consumer received only {} frames",
        received.len()
    );
    // ...and strictly in emission order.
    for pair in received.windows(2) {
        assert!(pair[0] < pair[1], "out of order: {pair:?}");
    }

    // The slow consumer holds at most its queue capacity, also in order.
    let mut held = Vec::new();
    while let Ok(frame) = slow.frames.try_recv() {
        held.push(frame[0]);
    }
    assert!(held.len() <= LISTENER_CAP, "slow queue held {}", held.len());
    assert!(!held.is_empty());
    for pair in held.windows(2) {
        assert!(pair[0] < pair[1], "out of order: {pair:?}");
    }
}
