//! Live bridge against a fake streaming provider

mod common;

use common::*;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use wxb_core::{Throttle, Timestamp};
use wxb_daemon::{run_bridge, BridgeOptions, Scheduler};
use wxb_store::ObservationStore;
use wxb_tempest::{RetryPolicy, SessionConfig};

type ServerWs = WebSocketStream<TcpStream>;

fn sample(ts: Timestamp) -> String {
    format!("[{ts},0.1,0.5,1.2,270,3,1011.2,8.4,77,0,0,0,0,0,0,0,2.61,1,0,null,null,0]")
}

async fn send(ws: &mut ServerWs, text: String) {
    ws.send(Message::text(text)).await.unwrap();
}

async fn recv_json(ws: &mut ServerWs) -> Option<Value> {
    while let Some(Ok(msg)) = ws.next().await {
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).ok();
        }
    }
    None
}

async fn subscribe(ws: &mut ServerWs) {
    send(ws, r#"{"type":"connection_opened"}"#.to_string()).await;
    let start = recv_json(ws).await.unwrap();
    assert_eq!(start["type"], "listen_start");
    send(ws, format!(r#"{{"type":"ack","id":{}}}"#, start["id"])).await;
}

async fn provider<F, Fut>(script: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(usize, ServerWs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let ws = accept_async(stream).await.unwrap();
            tokio::spawn(script(n, ws));
        }
    });
    (format!("ws://{addr}/swd/data"), connections)
}

fn options(ws_url: String, reconnect: bool) -> BridgeOptions {
    BridgeOptions {
        session: SessionConfig {
            ws_url,
            token: "secret".into(),
            device_id: DEVICE,
        },
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        reconnect,
    }
}

async fn stored(store: &ObservationStore) -> Vec<Timestamp> {
    store
        .range(DEVICE, 0, i64::MAX)
        .await
        .unwrap()
        .iter()
        .map(|o| o.timestamp)
        .collect()
}

#[tokio::test]
async fn test_stream_end_without_reconnect() {
    let (url, connections) = provider(|_, mut ws| async move {
        subscribe(&mut ws).await;
        send(
            &mut ws,
            format!(r#"{{"type":"obs_st","obs":[{},{},{}]}}"#, sample(0), sample(60), sample(400)),
        )
        .await;
        ws.close(None).await.unwrap();
    })
    .await;

    let store = ObservationStore::in_memory().await.unwrap();
    let forwarder = ScriptedForwarder::default();
    let mut scheduler = Scheduler::new(
        Box::new(store.clone()),
        Box::new(forwarder.clone()),
        station(),
        DEVICE,
        Throttle::default(),
    );
    let (shutdown, _rx) = watch::channel(false);

    tokio::time::timeout(
        Duration::from_secs(5),
        run_bridge(&mut scheduler, &options(url, false), &shutdown),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(stored(&store).await, vec![0, 60, 400]);
    assert_eq!(forwarder.attempted_timestamps(), vec![0, 400]);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnect_keeps_throttle_and_tolerates_redelivery() {
    let stops = Arc::new(Mutex::new(Vec::new()));
    let seen = stops.clone();
    let (url, connections) = provider(move |n, mut ws| {
        let seen = seen.clone();
        async move {
            subscribe(&mut ws).await;
            if n == 0 {
                send(&mut ws, format!(r#"{{"type":"obs_st","obs":[{},{}]}}"#, sample(0), sample(60))).await;
                ws.close(None).await.unwrap();
                return;
            }
            // redeliver 60, then a sample inside the window carried over
            send(
                &mut ws,
                format!(r#"{{"type":"obs_st","obs":[{},{},{}]}}"#, sample(60), sample(200), sample(320)),
            )
            .await;
            while let Some(msg) = recv_json(&mut ws).await {
                if msg["type"] == "listen_stop" {
                    seen.lock().unwrap().push(msg);
                }
            }
        }
    })
    .await;

    let store = ObservationStore::in_memory().await.unwrap();
    let forwarder = ScriptedForwarder::default();
    let mut scheduler = Scheduler::new(
        Box::new(store.clone()),
        Box::new(forwarder.clone()),
        station(),
        DEVICE,
        Throttle::default(),
    );
    let (shutdown, _rx) = watch::channel(false);

    let stop_when_stored = async {
        while stored(&store).await.len() < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.send_replace(true);
    };
    let bridge_options = options(url, true);
    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(5),
        async { tokio::join!(run_bridge(&mut scheduler, &bridge_options, &shutdown), stop_when_stored) },
    )
    .await
    .unwrap();
    result.unwrap();

    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert_eq!(stored(&store).await, vec![0, 60, 200, 320]);
    assert_eq!(forwarder.attempted_timestamps(), vec![0, 320]);
    assert_eq!(scheduler.stats().duplicates, 1);

    // the close handshake may still be in flight on the provider side
    for _ in 0..50 {
        if !stops.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stops = stops.lock().unwrap();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0]["device_id"], DEVICE);
}

#[tokio::test]
async fn test_shutdown_before_subscribe() {
    let (url, connections) = provider(|_, mut ws| async move {
        subscribe(&mut ws).await;
    })
    .await;

    let store = ObservationStore::in_memory().await.unwrap();
    let mut scheduler = Scheduler::new(
        Box::new(store),
        Box::new(ScriptedForwarder::default()),
        station(),
        DEVICE,
        Throttle::default(),
    );
    let (shutdown, _rx) = watch::channel(true);

    run_bridge(&mut scheduler, &options(url, true), &shutdown)
        .await
        .unwrap();
    assert_eq!(connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reconnect_backs_off_until_a_session_delivers() {
    let opened = Arc::new(Mutex::new(Vec::new()));
    let log = opened.clone();
    let (url, connections) = provider(move |n, mut ws| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(Instant::now());
            subscribe(&mut ws).await;
            match n {
                3 => {
                    send(&mut ws, format!(r#"{{"type":"obs_st","obs":[{}]}}"#, sample(0))).await;
                    ws.close(None).await.unwrap();
                }
                4 => while recv_json(&mut ws).await.is_some() {},
                _ => ws.close(None).await.unwrap(),
            }
        }
    })
    .await;

    let store = ObservationStore::in_memory().await.unwrap();
    let mut scheduler = Scheduler::new(
        Box::new(store.clone()),
        Box::new(ScriptedForwarder::default()),
        station(),
        DEVICE,
        Throttle::default(),
    );
    let mut options = options(url, true);
    options.retry.base_delay = Duration::from_millis(20);
    options.retry.max_delay = Duration::from_millis(400);
    let (shutdown, _rx) = watch::channel(false);

    let stop_after_five = async {
        while connections.load(Ordering::SeqCst) < 5 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.send_replace(true);
    };
    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(5),
        async { tokio::join!(run_bridge(&mut scheduler, &options, &shutdown), stop_after_five) },
    )
    .await
    .unwrap();
    result.unwrap();

    let opened = opened.lock().unwrap();
    let gaps: Vec<Duration> = opened.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps.len(), 4);
    assert!(gaps[0] >= Duration::from_millis(20), "{gaps:?}");
    assert!(gaps[1] >= Duration::from_millis(40), "{gaps:?}");
    assert!(gaps[2] >= Duration::from_millis(80), "{gaps:?}");
    // the fourth session delivered, so the wait starts over
    assert!(gaps[3] < Duration::from_millis(80), "{gaps:?}");
    assert_eq!(stored(&store).await, vec![0]);
}
