// tests/integration_tests.rs
//! Cross-module integration tests covering the core's end-to-end scenarios.

use fastdfs_core::io::{spawn_worker, Dispatcher, Interest, WorkerHandle};
use fastdfs_core::prelude::*;
use fastdfs_core::task::{CallbackOutcome, Task};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Scenario 1: timer sweep basic
// ---------------------------------------------------------------------------

#[test]
fn timer_sweep_basic_returns_expired_entries_in_order() {
    let mut wheel = TimingWheel::new(8, 1000).unwrap();
    let e1002 = wheel.add(1002, TimerOwner::Anonymous);
    let e1005 = wheel.add(1005, TimerOwner::Anonymous);
    let e1010 = wheel.add(1010, TimerOwner::Anonymous);

    let expired = wheel.sweep(1006);
    assert_eq!(wheel.current_time(), 1006);
    assert_eq!(expired.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![e1002, e1005]);

    assert_eq!(wheel.slot_of(e1010).unwrap(), (1010 - 1000) % 8);
}

// ---------------------------------------------------------------------------
// Scenario 2: lazy rehash
// ---------------------------------------------------------------------------

#[test]
fn lazy_rehash_relocates_on_next_sweep_then_expires() {
    let mut wheel = TimingWheel::new(8, 1000).unwrap();
    let e = wheel.add(1003, TimerOwner::Anonymous);
    assert_eq!(wheel.slot_of(e).unwrap(), 3);

    wheel.modify(e, 1011).unwrap();
    // still physically in slot 3 until the next sweep visits it
    assert_eq!(wheel.slot_of(e).unwrap(), 3);

    let none_yet = wheel.sweep(1004);
    assert!(none_yet.is_empty());
    assert_eq!(wheel.slot_of(e).unwrap(), (1011 - 1000) % 8);

    let expired = wheel.sweep(1012);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].0, e);
}

// ---------------------------------------------------------------------------
// Scenario 3: pool exhaustion + LIFO reuse
// ---------------------------------------------------------------------------

#[test]
fn task_pool_exhaustion_then_lifo_reuse() {
    let pool = TaskPool::new(TaskPoolConfig {
        capacity: 2,
        min_buf: 64,
        max_buf: 4096,
        arg_size: 0,
        mode: AllocMode::SeparateBuffer,
    })
    .unwrap();

    let (id_a, task_a) = pool.acquire().unwrap();
    let (id_b, task_b) = pool.acquire().unwrap();
    assert!(pool.acquire().is_none(), "capacity 2 must refuse a third acquire");

    pool.release(id_a, task_a);
    let (id_back, _) = pool.acquire().unwrap();
    assert_eq!(id_back.slot(), id_a.slot(), "most recently released slot comes back first (LIFO)");

    pool.release(id_b, task_b);
    let stats = pool.stats();
    assert_eq!(stats.capacity, 2);
}

// ---------------------------------------------------------------------------
// Scenario 4: connection reuse and idle-timeout eviction
// ---------------------------------------------------------------------------

fn spawn_echo_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accept_listener = listener.try_clone().unwrap();
    std::thread::spawn(move || {
        for stream in accept_listener.incoming() {
            let mut stream = match stream {
                Ok(s) => s,
                Err(_) => break,
            };
            let mut buf = [0u8; 64];
            let _ = stream.read(&mut buf);
        }
    });
    (listener, addr)
}

#[test]
fn connection_pool_reuses_then_evicts_stale_connection() {
    let (_listener, addr) = spawn_echo_server();
    let pool = ConnectionPool::new(
        vec![addr.clone()],
        4,
        Duration::from_secs(2),
        Duration::from_millis(50),
    );

    let conn = pool.get(Some(&addr)).unwrap();
    let first_local_port = conn.stream_mut_test_port();
    pool.put(Some(conn));
    assert_eq!(pool.idle_count(&addr), 1);

    let reused = pool.get(Some(&addr)).unwrap();
    assert_eq!(reused.stream_mut_test_port(), first_local_port, "get() must hand back the same socket");
    pool.put(Some(reused));

    std::thread::sleep(Duration::from_millis(120));

    // the pooled entry is now stale; get() must discard it and open a fresh one
    let fresh = pool.get(Some(&addr)).unwrap();
    assert_ne!(fresh.stream_mut_test_port(), first_local_port);
}

trait LocalPortForTest {
    fn stream_mut_test_port(&mut self) -> u16;
}

impl LocalPortForTest for Connection {
    fn stream_mut_test_port(&mut self) -> u16 {
        self.stream_mut().local_addr().unwrap().port()
    }
}

// ---------------------------------------------------------------------------
// Scenario 5: listener hand-off wakes the right worker
// ---------------------------------------------------------------------------

struct EchoCounter {
    hits: Arc<AtomicUsize>,
}

impl TaskCallbacks for EchoCounter {
    fn on_readable(&self, task: &mut Task) -> CallbackOutcome {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let mut buf = [0u8; 16];
        if let Some(conn) = task.conn.as_mut() {
            let _ = conn.read(&mut buf);
            let _ = conn.write_all(b"ack");
        }
        CallbackOutcome::Delete
    }
}

#[test]
fn dispatch_wakes_worker_and_runs_callback() {
    let pool = Arc::new(
        TaskPool::new(TaskPoolConfig {
            capacity: 8,
            min_buf: 256,
            max_buf: 256,
            arg_size: 0,
            mode: AllocMode::WholeBlock,
        })
        .unwrap(),
    );
    let runtime = Arc::new(Runtime::new(pool.clone()));

    let (join, init) = spawn_worker(0, runtime.clone(), 30, 61, 128).unwrap();
    let handle = WorkerHandle::new(0, init);
    let dispatcher = Dispatcher::new(pool.clone(), vec![handle]).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let callback = Arc::new(EchoCounter { hits: hits.clone() });

    let client = std::net::TcpStream::connect(server_addr).unwrap();

    let (std_stream, peer) = listener.accept().unwrap();
    std_stream.set_nonblocking(true).unwrap();
    let mio_stream = mio::net::TcpStream::from_std(std_stream);
    dispatcher.dispatch(mio_stream, peer, callback, Interest::Readable).unwrap();

    let mut client = client;
    client.write_all(b"hello").unwrap();

    let mut ack = [0u8; 3];
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    client.read_exact(&mut ack).unwrap();
    assert_eq!(&ack, b"ack");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    runtime.shutdown();
    join.join().unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Scenario 6: graceful connection-pool shutdown under concurrent get/put
// ---------------------------------------------------------------------------

#[test]
fn connection_pool_close_is_safe_under_concurrent_get_and_put() {
    let (_listener, addr) = spawn_echo_server();
    let pool = Arc::new(ConnectionPool::new(
        vec![addr.clone()],
        4,
        Duration::from_secs(2),
        Duration::from_secs(10),
    ));

    let warm = pool.get(Some(&addr)).unwrap();
    pool.put(Some(warm));

    let pool_getter = pool.clone();
    let addr_getter = addr.clone();
    let getter = std::thread::spawn(move || {
        for _ in 0..50 {
            match pool_getter.get(Some(&addr_getter)) {
                Ok(conn) => pool_getter.put(Some(conn)),
                Err(CoreError::PoolClosed) => break,
                Err(_) => break,
            }
        }
    });

    let pool_closer = pool.clone();
    let closer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(5));
        pool_closer.close();
    });

    getter.join().unwrap();
    closer.join().unwrap();

    assert!(matches!(pool.get(Some(&addr)), Err(CoreError::PoolClosed)));
    assert_eq!(pool.idle_count(&addr), 0);
}

// ---------------------------------------------------------------------------
// Protocol: header + file id + metadata + anti-leech token, end to end
// ---------------------------------------------------------------------------

#[test]
fn protocol_header_round_trips_for_boundary_values() {
    for (len, cmd) in [(0u64, 0u8), (1, 11), (u32::MAX as u64, 100), (i64::MAX as u64, 255)] {
        let req = Header::request(len, cmd);
        let encoded = req.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(decoded.body_len, len);
        assert_eq!(decoded.cmd, cmd);
        assert_eq!(decoded.status, 0, "a request header always carries status 0");
    }
}

#[test]
fn full_upload_request_frame_round_trips_metadata_and_file_id() {
    let file_id = FileId::parse("group1/0A/1F/photo.jpg").unwrap();
    let pairs = vec![
        ("width".to_string(), "1920".to_string()),
        ("height".to_string(), "1080".to_string()),
    ];
    let body = fastdfs_core::protocol::metadata::encode(&pairs);

    let header = Header::request(body.len() as u64, u8::from(Command::StorageSetMetadata));
    let mut frame = header.encode().to_vec();
    frame.extend_from_slice(file_id.to_id_string().as_bytes());
    frame.push(0u8);
    frame.extend_from_slice(&body);

    let decoded_header = Header::decode(&frame[..fastdfs_core::protocol::header::HEADER_LEN]).unwrap();
    assert_eq!(decoded_header.cmd, u8::from(Command::StorageSetMetadata));

    let rest = &frame[fastdfs_core::protocol::header::HEADER_LEN..];
    let nul = rest.iter().position(|&b| b == 0).unwrap();
    let parsed_id = FileId::parse(std::str::from_utf8(&rest[..nul]).unwrap()).unwrap();
    assert_eq!(parsed_id, file_id);

    let parsed_pairs = fastdfs_core::protocol::metadata::decode(&rest[nul + 1..]).unwrap();
    assert_eq!(parsed_pairs, pairs);
}

#[test]
fn anti_leech_token_is_accepted_within_ttl_and_rejected_outside_it() {
    let secret = "example-secret";
    let fid = "group1/0A/1F/movie.mp4";
    let ts = 1_700_000_000u64;
    let token = fastdfs_core::protocol::token::generate(secret, fid, ts);

    assert!(fastdfs_core::protocol::token::check(&token, secret, fid, ts, ts + 10, 30));
    assert!(!fastdfs_core::protocol::token::check(&token, secret, fid, ts, ts + 31, 30));
}

// ---------------------------------------------------------------------------
// Config: #include resolution and duplicate-key round trip feeding Settings
// ---------------------------------------------------------------------------

#[test]
fn settings_load_from_included_ini_files() {
    let dir = std::env::temp_dir().join(format!("fdfs-core-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    std::fs::write(
        dir.join("timeouts.conf"),
        "connect_timeout = 7\nnetwork_timeout = 45\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("main.conf"),
        "max_connections = 512\nmin_buff_size = 8192\nmax_buff_size = 8192\nwork_threads = 6\n#include timeouts.conf\n",
    )
    .unwrap();

    let ctx = IniContext::load_file(dir.join("main.conf")).unwrap();
    let settings = Settings::from_ini(&ctx).unwrap();

    assert_eq!(settings.max_connections, 512);
    assert_eq!(settings.min_buff_size, 8192);
    assert_eq!(settings.max_buff_size, 8192);
    assert_eq!(settings.work_threads, 6);
    assert_eq!(settings.connect_timeout_secs, 7);
    assert_eq!(settings.network_timeout_secs, 45);

    let dumped = ctx.dump();
    let reparsed = IniContext::parse(&dumped).unwrap();
    assert_eq!(reparsed.get_global("max_connections"), Some("512"));
    assert_eq!(reparsed.get_global("network_timeout"), Some("45"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn ini_preserves_duplicate_keys_in_insertion_order_across_sections() {
    let mut ctx = IniContext::new();
    ctx.push("", "max_connections", "256");
    ctx.push("group1", "ip", "10.0.0.1");
    ctx.push("group1", "ip", "10.0.0.2");
    ctx.push("group2", "ip", "10.0.0.3");

    let dumped = ctx.dump();
    let reparsed = IniContext::parse(&dumped).unwrap();
    assert_eq!(reparsed, ctx);
    assert_eq!(reparsed.get_all("group1", "ip"), vec!["10.0.0.1", "10.0.0.2"]);
}

