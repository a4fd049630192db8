//! Driver and run loop against a loopback controller.

use catraca_core::{FakeClock, MessageIndex, WeekDay};
use catraca_engine::{
    AccessEngine, DisplayMessages, DriverEvent, EngineConfig, TurnstileCommands, TurnstileDriver,
};
use catraca_network::TransportConfig;
use catraca_protocol::{Frame, encode_frame};
use catraca_storage::{
    AccessRepository, ClassRepository, Database, FileLock, NewClassSchedule, NewTag,
    TagRepository,
};
use chrono::{TimeZone, Utc};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

fn config_for(listener: &TcpListener) -> TransportConfig {
    TransportConfig {
        addr: listener.local_addr().unwrap(),
        connect_timeout: Duration::from_secs(1),
        idle_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(1),
    }
}

async fn next(driver: &mut TurnstileDriver) -> DriverEvent {
    tokio::time::timeout(Duration::from_secs(2), driver.next_event())
        .await
        .expect("timed out waiting for driver event")
        .expect("driver event stream ended")
}

async fn read_frame(stream: &mut TcpStream) -> Frame {
    let mut buf = vec![0u8; 256];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("timed out waiting for command")
        .unwrap();
    Frame::decode(&buf[..n]).unwrap()
}

#[tokio::test]
async fn test_start_connects_eagerly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut driver = TurnstileDriver::start(config_for(&listener), 5).await;
    let (_server, _) = listener.accept().await.unwrap();

    assert!(matches!(next(&mut driver).await, DriverEvent::Connected));
    assert!(driver.is_connected().await);
}

#[tokio::test]
async fn test_inbound_chunks_are_decoded() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut driver = TurnstileDriver::start(config_for(&listener), 5).await;
    let (mut server, _) = listener.accept().await.unwrap();
    assert!(matches!(next(&mut driver).await, DriverEvent::Connected));

    let read = encode_frame(
        MessageIndex::new(12).unwrap(),
        "REON+000+0]1001]19/10/2026 09:00:00]1]0]2",
    )
    .unwrap();
    server.write_all(&read).await.unwrap();

    let DriverEvent::Frame(Ok(frame)) = next(&mut driver).await else {
        panic!("expected a decoded frame");
    };
    assert_eq!(frame.index().as_u8(), 12);
    assert_eq!(frame.fields()[1], "1001");

    server.write_all(b"noise").await.unwrap();
    assert!(matches!(next(&mut driver).await, DriverEvent::Frame(Err(_))));
}

#[tokio::test]
async fn test_commands_reach_the_controller() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut driver = TurnstileDriver::start(config_for(&listener), 7).await;
    let (mut server, _) = listener.accept().await.unwrap();
    assert!(matches!(next(&mut driver).await, DriverEvent::Connected));

    driver
        .allow_entry(MessageIndex::new(1).unwrap(), DisplayMessages::ACCESS_GRANTED)
        .await;
    let frame = read_frame(&mut server).await;
    assert_eq!(frame.data(), "6]7]ACESSO LIBERADO]2");

    driver.allow_exit(MessageIndex::new(2).unwrap(), "TCHAU").await;
    let frame = read_frame(&mut server).await;
    assert_eq!(frame.data(), "5]7]TCHAU]1");

    driver.deny_access(MessageIndex::new(3).unwrap(), None).await;
    let frame = read_frame(&mut server).await;
    assert_eq!(frame.index().as_u8(), 3);
    assert_eq!(frame.data(), "30]7]ACCESS DENIED]1");
}

#[tokio::test]
async fn test_reconnects_after_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut driver = TurnstileDriver::start(config_for(&listener), 5)
        .await
        .with_reconnect_pause(Duration::from_millis(50));
    let (server, _) = listener.accept().await.unwrap();
    assert!(matches!(next(&mut driver).await, DriverEvent::Connected));

    drop(server);
    assert!(matches!(
        next(&mut driver).await,
        DriverEvent::Closed { had_error: false }
    ));

    let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
    assert!(matches!(next(&mut driver).await, DriverEvent::Connected));
    accept.await.unwrap();
}

#[tokio::test]
async fn test_keeps_retrying_until_controller_returns() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&listener);
    drop(listener);

    let mut driver = TurnstileDriver::start(config.clone(), 5)
        .await
        .with_reconnect_pause(Duration::from_millis(50));

    assert!(matches!(next(&mut driver).await, DriverEvent::Error(_)));
    assert!(matches!(
        next(&mut driver).await,
        DriverEvent::Closed { had_error: true }
    ));
    assert!(matches!(next(&mut driver).await, DriverEvent::Error(_)));
    assert!(matches!(
        next(&mut driver).await,
        DriverEvent::Closed { had_error: true }
    ));

    let listener = TcpListener::bind(config.addr).await.unwrap();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

    loop {
        match next(&mut driver).await {
            DriverEvent::Connected => break,
            DriverEvent::Error(_) | DriverEvent::Closed { .. } => continue,
            other => panic!("unexpected event {other:?}"),
        }
    }
    accept.await.unwrap();
}

#[tokio::test]
async fn test_close_stops_reconnecting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut driver = TurnstileDriver::start(config_for(&listener), 5)
        .await
        .with_reconnect_pause(Duration::from_millis(10));
    let (_server, _) = listener.accept().await.unwrap();
    assert!(matches!(next(&mut driver).await, DriverEvent::Connected));

    driver.close().await;
    assert!(matches!(
        next(&mut driver).await,
        DriverEvent::Closed { had_error: false }
    ));

    let idle = tokio::time::timeout(Duration::from_millis(200), driver.next_event()).await;
    assert!(idle.is_err(), "no reconnect expected after close");
    assert!(!driver.is_connected().await);
}

/// Card read in, release out, turn confirmation stored, then shutdown.
#[tokio::test]
async fn test_run_loop_end_to_end() {
    let db = Database::in_memory().await.unwrap();
    let repos = db.repositories();
    repos
        .tags
        .create_or_update(&NewTag {
            user_id: "2024001".to_string(),
            credential: 1001,
            released: true,
            status: String::new(),
            admin: false,
        })
        .await
        .unwrap();
    repos
        .classes
        .create(&NewClassSchedule {
            start: 540,
            week_day: WeekDay::Monday,
            user_id: "2024001".to_string(),
        })
        .await
        .unwrap();

    // Monday 09:00 in Sao Paulo
    let clock = FakeClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap());
    let dir = tempfile::TempDir::new().unwrap();
    let lock = FileLock::with_clock(dir.path(), "import", Duration::from_secs(60), clock.clone());
    let engine = AccessEngine::new(repos.clone(), lock, clock, EngineConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let driver = TurnstileDriver::start(config_for(&listener), 5).await;
    let (mut server, _) = listener.accept().await.unwrap();

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(engine.run(driver, shutdown.clone()));

    let index = MessageIndex::new(33).unwrap();
    server
        .write_all(&encode_frame(index, "REON+000+0]1001]19/10/2026 09:00:00]1]0]2").unwrap())
        .await
        .unwrap();

    let release = read_frame(&mut server).await;
    assert_eq!(release.index(), index);
    assert_eq!(release.data(), "6]5]ACESSO LIBERADO]2");

    server
        .write_all(&encode_frame(index, "REON+000+81]]19/10/2026 09:00:02]0]0]2").unwrap())
        .await
        .unwrap();

    let mut waiting = Vec::new();
    for _ in 0..50 {
        waiting = repos.accesses.get_waiting_accesses().await.unwrap();
        if !waiting.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].user_id, "2024001");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("engine did not stop")
        .unwrap();
}
