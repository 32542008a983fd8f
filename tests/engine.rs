use std::time::{Duration, Instant};

use ipconn::{Engine, Role, Transport, INVALID_ID};
use serial_test::serial;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `f` until it returns `Some`, or panics after `timeout`.
fn wait_until<T>(timeout: Duration, mut f: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = f() {
            return v;
        }
        if Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
#[serial]
fn tcp_echo_loopback() {
    init();
    let engine = Engine::new();
    let server = engine.open(Transport::Tcp, Role::Server, None, 50000);
    assert_ne!(server, INVALID_ID);
    let client = engine.open(Transport::Tcp, Role::Client, Some("127.0.0.1"), 50000);
    assert_ne!(client, INVALID_ID);

    assert!(engine.write(client, b"hello"));

    let new_client = wait_until(Duration::from_secs(2), || {
        let id = engine.get_client(server);
        (id != INVALID_ID).then_some(id)
    });

    let payload = wait_until(Duration::from_secs(2), || engine.read(new_client));
    assert_eq!(payload.len(), ipconn::MAX_MESSAGE_LENGTH);
    assert_eq!(&payload[..5], b"hello");

    engine.close(client);
    engine.close(new_client);
    engine.close(server);
}

#[test]
#[serial]
fn udp_unicast_in_order() {
    init();
    let engine = Engine::new();
    let server = engine.open(Transport::Udp, Role::Server, None, 50001);
    let client = engine.open(Transport::Udp, Role::Client, Some("127.0.0.1"), 50001);
    assert_ne!(server, INVALID_ID);
    assert_ne!(client, INVALID_ID);

    assert!(engine.write(client, b"A"));
    assert!(engine.write(client, b"B"));

    let peer = wait_until(Duration::from_secs(2), || {
        let id = engine.get_client(server);
        (id != INVALID_ID).then_some(id)
    });

    let first = wait_until(Duration::from_secs(2), || engine.read(peer));
    let second = wait_until(Duration::from_secs(2), || engine.read(peer));
    assert_eq!(first[0], b'A');
    assert_eq!(second[0], b'B');

    engine.close(client);
    engine.close(server);
}

#[test]
#[serial]
fn outbound_queue_saturates_without_blocking() {
    init();
    let engine = Engine::new();
    let server = engine.open(Transport::Tcp, Role::Server, None, 50002);
    let client = engine.open(Transport::Tcp, Role::Client, Some("127.0.0.1"), 50002);
    assert_ne!(server, INVALID_ID);
    assert_ne!(client, INVALID_ID);

    // More than QUEUE_CAPACITY writes in a row must all report success; the
    // write pump may not have drained any of them yet.
    for _ in 0..(ipconn::QUEUE_CAPACITY * 2) {
        assert!(engine.write(client, b"x"));
    }

    engine.close(client);
    engine.close(server);
}

#[test]
#[serial]
fn peer_close_shrinks_server_roster() {
    init();
    let engine = Engine::new();
    let server = engine.open(Transport::Tcp, Role::Server, None, 50003);
    let client = engine.open(Transport::Tcp, Role::Client, Some("127.0.0.1"), 50003);
    assert_ne!(server, INVALID_ID);
    assert_ne!(client, INVALID_ID);

    let accepted = wait_until(Duration::from_secs(2), || {
        let id = engine.get_client(server);
        (id != INVALID_ID).then_some(id)
    });
    assert_eq!(engine.get_clients_number(server), 1);

    engine.close(client);

    wait_until(Duration::from_secs(2), || {
        (engine.get_clients_number(server) == 0).then_some(())
    });

    engine.close(accepted);
    engine.close(server);
}

#[test]
#[serial]
fn server_binds_explicit_host() {
    init();
    let engine = Engine::new();
    let server = engine.open(Transport::Tcp, Role::Server, Some("127.0.0.1"), 50006);
    assert_ne!(server, INVALID_ID);
    assert_eq!(engine.get_address(server), Some("127.0.0.1/50006".to_string()));
    engine.close(server);
}

#[test]
fn bad_port_rejected() {
    init();
    let engine = Engine::new();
    let before = engine.get_actives_number();
    let id = engine.open(Transport::Tcp, Role::Client, Some("127.0.0.1"), 80);
    assert_eq!(id, INVALID_ID);
    assert_eq!(engine.get_actives_number(), before);
}

#[test]
#[serial]
fn shutdown_then_reopen() {
    init();
    let engine = Engine::new();
    let a = engine.open(Transport::Tcp, Role::Server, None, 50004);
    let b = engine.open(Transport::Udp, Role::Server, None, 50005);
    assert_ne!(a, INVALID_ID);
    assert_ne!(b, INVALID_ID);

    engine.close(a);
    engine.close(b);
    assert_eq!(engine.get_actives_number(), 0);

    // A fresh open after the registry drained must still work, i.e. the
    // pumps were rejoined cleanly and not left half-stopped.
    let c = engine.open(Transport::Tcp, Role::Server, None, 50004);
    assert_ne!(c, INVALID_ID);
    engine.close(c);
}
