//! End-to-end pipeline test: stream messages in one side, observe the
//! ring, the daily files, and the restart buffer on the other.

use std::fs;
use std::io::Read;
use std::time::Duration;

use chrono::TimeZone;
use flate2::read::GzDecoder;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use types::{CurrencyPair, LastPrice, PriceLevel, Stream, StoreData, Trade};

use market_data::actor::{StateActor, StateHandle, PERSIST_QUEUE, STREAM_QUEUE};
use market_data::buffer;
use market_data::writer::{archive_path, run_store_writer, tmp_path};

fn pair() -> CurrencyPair {
    CurrencyPair::new("btc_jpy")
}

fn stream(ask: f64, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Stream {
    Stream {
        asks: vec![PriceLevel(ask, 1.0)],
        bids: vec![PriceLevel(99.0, 2.0)],
        trades: vec![Trade {
            currency_pair: "btc_jpy".to_string(),
            trade_type: "bid".to_string(),
            price: 99.5,
            tid: 7,
            amount: 0.5,
            date: 1000,
        }],
        timestamp: chrono_tz::Asia::Tokyo
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap(),
        last_price: LastPrice {
            action: "bid".to_string(),
            price: 99.5,
        },
        currency_pair: "btc_jpy".to_string(),
    }
}

struct Pipeline {
    streams: mpsc::Sender<Stream>,
    handle: StateHandle,
    shutdown: CancellationToken,
    actor_task: tokio::task::JoinHandle<()>,
    writer_task: tokio::task::JoinHandle<()>,
}

fn spawn_pipeline(root: &std::path::Path) -> Pipeline {
    let (actor, handle) = StateActor::new(root, pair(), 64);
    let (streams, stream_rx) = mpsc::channel(STREAM_QUEUE);
    let (persist_tx, persist_rx) = mpsc::channel(PERSIST_QUEUE);
    let shutdown = CancellationToken::new();

    let actor_task = tokio::spawn(actor.run(stream_rx, persist_tx, shutdown.clone()));
    let writer_task = tokio::spawn(run_store_writer(
        root.to_path_buf(),
        pair(),
        persist_rx,
        shutdown.clone(),
    ));

    Pipeline {
        streams,
        handle,
        shutdown,
        actor_task,
        writer_task,
    }
}

async fn wait_for_ring_len(handle: &StateHandle, n: usize) {
    for _ in 0..200 {
        if let Some(ring) = handle.ring().await {
            if ring.len() == n {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("ring never reached length {n}");
}

async fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn test_first_message_flows_to_ring_and_disk() {
    let tmp = TempDir::new().unwrap();
    let p = spawn_pipeline(tmp.path());

    p.streams
        .send(stream(100.0, 2020, 1, 1, 0, 0, 0))
        .await
        .unwrap();
    wait_for_ring_len(&p.handle, 1).await;

    // Ring record carries all three fields and the Tokyo epoch.
    let ring = p.handle.ring().await.unwrap();
    let sd = ring.iter().next().unwrap();
    assert_eq!(sd.ask, Some(PriceLevel(100.0, 1.0)));
    assert_eq!(sd.bid, Some(PriceLevel(99.0, 2.0)));
    assert_eq!(sd.trade.as_ref().unwrap().tid, 7);
    assert_eq!(sd.timestamp, 1577804400);

    // Last price reflects the message.
    let lp = p.handle.last_price().await.unwrap();
    assert_eq!(lp.action, "bid");

    // The day file appears with the record inside.
    let day = sd.tokyo_day();
    let path = tmp_path(tmp.path(), &pair(), day);
    wait_for("day file", || {
        fs::read_to_string(&path).map(|c| c.contains("\"ts\":1577804400")).unwrap_or(false)
    })
    .await;

    p.shutdown.cancel();
    p.actor_task.await.unwrap();
    p.writer_task.await.unwrap();
}

#[tokio::test]
async fn test_duplicate_suppression_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let p = spawn_pipeline(tmp.path());

    p.streams
        .send(stream(100.0, 2020, 1, 1, 0, 0, 0))
        .await
        .unwrap();
    p.streams
        .send(stream(100.0, 2020, 1, 1, 0, 0, 1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let ring = p.handle.ring().await.unwrap();
    assert_eq!(ring.len(), 1);

    p.shutdown.cancel();
    p.actor_task.await.unwrap();
    p.writer_task.await.unwrap();
}

#[tokio::test]
async fn test_day_rotation_through_the_pipeline() {
    let tmp = TempDir::new().unwrap();
    let p = spawn_pipeline(tmp.path());

    p.streams
        .send(stream(100.0, 2020, 1, 1, 23, 59, 59))
        .await
        .unwrap();
    p.streams
        .send(stream(101.0, 2020, 1, 2, 0, 0, 1))
        .await
        .unwrap();
    wait_for_ring_len(&p.handle, 2).await;

    let day1 = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let day2 = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();

    let gz_path = archive_path(tmp.path(), &pair(), day1);
    wait_for("rotated archive", || gz_path.exists()).await;

    let mut decompressed = String::new();
    GzDecoder::new(fs::File::open(&gz_path).unwrap())
        .read_to_string(&mut decompressed)
        .unwrap();
    let archived: Vec<StoreData> = serde_json::from_str(&decompressed).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].timestamp, 1577890799);

    let content = fs::read_to_string(tmp_path(tmp.path(), &pair(), day2)).unwrap();
    assert!(content.starts_with('['));
    let open_day: Vec<StoreData> = serde_json::from_str(&format!("{content}]")).unwrap();
    assert_eq!(open_day.len(), 1);
    assert_eq!(open_day[0].timestamp, 1577890801);

    p.shutdown.cancel();
    p.actor_task.await.unwrap();
    p.writer_task.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_persists_and_restart_restores() {
    let tmp = TempDir::new().unwrap();

    {
        let p = spawn_pipeline(tmp.path());
        p.streams
            .send(stream(100.0, 2020, 1, 1, 0, 0, 0))
            .await
            .unwrap();
        p.streams
            .send(stream(101.0, 2020, 1, 1, 0, 0, 1))
            .await
            .unwrap();
        wait_for_ring_len(&p.handle, 2).await;

        p.shutdown.cancel();
        p.actor_task.await.unwrap();
        p.writer_task.await.unwrap();
    }

    // The buffer round-trips the ring exactly.
    let restored = buffer::read_buffer(
        &buffer::buffer_path(tmp.path(), &pair()),
        64,
    )
    .unwrap();
    assert_eq!(restored.len(), 2);

    // A restarted pipeline picks the ring back up and keeps appending.
    let p = spawn_pipeline(tmp.path());
    let ring = p.handle.ring().await.unwrap();
    assert_eq!(ring.len(), 2);
    assert_eq!(ring.iter().next().unwrap().timestamp, 1577804400);

    p.streams
        .send(stream(102.0, 2020, 1, 1, 0, 0, 2))
        .await
        .unwrap();
    wait_for_ring_len(&p.handle, 3).await;

    p.shutdown.cancel();
    p.actor_task.await.unwrap();
    p.writer_task.await.unwrap();
}
