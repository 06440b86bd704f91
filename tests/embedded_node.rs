//! End-to-end tests for the embedded node over real TCP connections.

use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use header_bridge::lifecycle::{Supervisor, SupervisorState};
use header_bridge::node::{EmbeddedNode, NodeOptions};
use header_bridge::sink::MemorySink;
use header_bridge::BridgeError;

mod common;

const WAIT: Duration = Duration::from_secs(5);

fn start(options: NodeOptions) -> (Supervisor<EmbeddedNode>, Arc<MemorySink>, SocketAddr) {
    let sink = Arc::new(MemorySink::new());
    let mut supervisor = Supervisor::new(EmbeddedNode::new(options));
    supervisor.start("127.0.0.1:0", sink.clone()).unwrap();
    let addr = supervisor.node().local_addr().expect("node reports its address");
    (supervisor, sink, addr)
}

#[test]
fn test_request_headers_are_delivered() {
    let (mut supervisor, sink, addr) = start(NodeOptions::default());

    let response = common::send_request(addr, b"GET / HTTP/1.1\r\nX-Test: 1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {}", response);
    assert!(sink.wait_for(1, WAIT));

    supervisor.stop().unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    assert_eq!(supervisor.node().local_addr(), None);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].bytes(), b"X-Test: 1");
}

#[test]
fn test_concurrent_clients_each_produce_one_event() {
    const CLIENTS: usize = 16;
    let (mut supervisor, sink, addr) = start(NodeOptions::default());

    let clients: Vec<_> = (0..CLIENTS)
        .map(|n| {
            thread::spawn(move || {
                let request = format!("GET /{} HTTP/1.1\r\nX-Client: {}\r\n\r\n", n, n);
                common::send_request(addr, request.as_bytes())
            })
        })
        .collect();
    for client in clients {
        assert!(client.join().unwrap().starts_with("HTTP/1.1 200"));
    }

    assert!(sink.wait_for(CLIENTS, WAIT));
    supervisor.stop().unwrap();

    let mut clients: Vec<String> = sink
        .events()
        .iter()
        .flat_map(|e| e.fields().map(|(_, v)| v.to_string()).collect::<Vec<_>>())
        .collect();
    clients.sort_by_key(|v| v.parse::<usize>().unwrap());
    assert_eq!(clients, (0..CLIENTS).map(|n| n.to_string()).collect::<Vec<_>>());
}

#[test]
fn test_occupied_port_is_startup_error() {
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = occupied.local_addr().unwrap().to_string();

    let sink = Arc::new(MemorySink::new());
    let mut supervisor = Supervisor::new(EmbeddedNode::default());
    let err = supervisor.start(&address, sink).unwrap_err();

    assert!(matches!(err, BridgeError::Startup { .. }), "got {:?}", err);
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    assert!(matches!(supervisor.stop(), Err(BridgeError::NotRunning)));
}

#[test]
fn test_unparseable_address_is_startup_error() {
    let mut supervisor = Supervisor::new(EmbeddedNode::default());
    let err = supervisor
        .start("not an address", Arc::new(MemorySink::new()))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Startup { .. }));
}

#[test]
fn test_oversized_head_is_rejected() {
    let options = NodeOptions {
        max_header_bytes: 128,
        ..NodeOptions::default()
    };
    let (mut supervisor, sink, addr) = start(options);

    let request = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(512));
    let response = common::send_request(addr, request.as_bytes());
    assert!(response.starts_with("HTTP/1.1 431"), "unexpected response: {}", response);

    supervisor.stop().unwrap();
    assert_eq!(sink.count(), 0);
}

#[test]
fn test_malformed_request_line_is_rejected() {
    let (mut supervisor, sink, addr) = start(NodeOptions::default());

    let response = common::send_request(addr, b"HELLO\r\nX-Test: 1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 400"), "unexpected response: {}", response);

    supervisor.stop().unwrap();
    assert_eq!(sink.count(), 0);
}

#[test]
fn test_stop_closes_idle_connections() {
    let (mut supervisor, sink, addr) = start(NodeOptions::default());

    // Connected but silent: the read would otherwise wait for the header timeout.
    let mut idle = TcpStream::connect(addr).unwrap();
    idle.set_read_timeout(Some(WAIT)).unwrap();
    thread::sleep(Duration::from_millis(50));

    let began = Instant::now();
    supervisor.stop().unwrap();
    assert!(began.elapsed() < Duration::from_secs(5));

    let mut buf = [0u8; 16];
    let n = idle.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0, "connection should be closed without a response");
    assert_eq!(sink.count(), 0);
}

#[test]
fn test_restart_on_same_port() {
    let (mut supervisor, _sink, addr) = start(NodeOptions::default());
    supervisor.stop().unwrap();

    let sink = Arc::new(MemorySink::new());
    supervisor.start(&addr.to_string(), sink.clone()).unwrap();
    let response = common::send_request(addr, b"GET / HTTP/1.1\r\nX-Again: 1\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(sink.wait_for(1, WAIT));
    supervisor.stop().unwrap();
}
