/*!
 * Socket Tests
 * Port binding, the connect/accept rendezvous, duplex traffic, shutdown,
 * and teardown of pending requests
 */

mod common;

use common::{boot, boot_kernel};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::time::{Duration, Instant};
use tiny_os_kernel::{
    task, Kernel, KernelConfig, KernelError, ShutdownMode, SocketError, NOPORT,
};

#[test]
fn test_listen_binds_port_until_close() {
    let status = boot(|k, _| {
        let sock = k.socket(100).unwrap();
        k.listen(sock).unwrap();
        assert!(k.port_bound(100));

        k.close(sock).unwrap();
        assert!(!k.port_bound(100));

        // The port is free for a new listener.
        let again = k.socket(100).unwrap();
        k.listen(again).unwrap();
        assert!(k.port_bound(100));
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_listen_on_busy_port_fails() {
    let status = boot(|k, _| {
        let first = k.socket(100).unwrap();
        k.listen(first).unwrap();

        let second = k.socket(100).unwrap();
        assert_eq!(
            k.listen(second),
            Err(KernelError::Socket(SocketError::PortBusy(100)))
        );
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_listen_on_noport_fails() {
    let status = boot(|k, _| {
        let sock = k.socket(NOPORT).unwrap();
        assert_eq!(
            k.listen(sock),
            Err(KernelError::Socket(SocketError::InvalidPort(NOPORT)))
        );
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_socket_on_out_of_range_port_fails() {
    let status = boot(|k, _| {
        assert_eq!(
            k.socket(2000).unwrap_err(),
            KernelError::Socket(SocketError::InvalidPort(2000))
        );
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_listen_on_non_socket_fails() {
    let status = boot(|k, _| {
        let (r, _w) = k.pipe().unwrap();
        assert_eq!(
            k.listen(r),
            Err(KernelError::Socket(SocketError::NotSocket(r)))
        );
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_connect_without_listener_fails() {
    let status = boot(|k, _| {
        let sock = k.socket(NOPORT).unwrap();
        assert_eq!(
            k.connect(sock, 100, None),
            Err(KernelError::Socket(SocketError::NoListener(100)))
        );
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_accept_on_unbound_socket_fails() {
    let status = boot(|k, _| {
        let sock = k.socket(100).unwrap();
        assert_eq!(
            k.accept(sock).unwrap_err(),
            KernelError::Socket(SocketError::WrongShape)
        );
        0
    });
    assert_eq!(status, 0);
}

#[test]
#[serial]
fn test_connect_times_out_without_accept() {
    let status = boot(|k, _| {
        let listener = k.socket(100).unwrap();
        k.listen(listener).unwrap();

        let client = k.socket(NOPORT).unwrap();
        let start = Instant::now();
        assert_eq!(
            k.connect(client, 100, Some(Duration::from_millis(50))),
            Err(KernelError::Socket(SocketError::Timeout))
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_duplex_echo_and_teardown() {
    let (kernel, status) = boot_kernel(KernelConfig::default(), |k: &Kernel, _: &[u8]| {
        let listener = k.socket(80).unwrap();
        k.listen(listener).unwrap();

        let client_thread = k
            .create_thread(
                task(|k, _| {
                    let client = k.socket(NOPORT).unwrap();
                    k.connect(client, 80, None).unwrap();
                    k.write(client, b"ping").unwrap();

                    let mut buf = [0u8; 4];
                    k.read(client, &mut buf).unwrap();
                    assert_eq!(&buf, b"pong");
                    k.close(client).unwrap();
                    0
                }),
                &[],
            )
            .unwrap();

        let conn = k.accept(listener).unwrap();
        let mut buf = [0u8; 4];
        k.read(conn, &mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        k.write(conn, b"pong").unwrap();

        assert_eq!(k.thread_join(client_thread), Ok(0));
        k.close(conn).unwrap();
        k.close(listener).unwrap();

        // Both peers and the listener are gone, along with their pipes.
        assert_eq!(k.socket_count(), 0);
        assert_eq!(k.pipe_count(), 0);
        0
    });
    assert_eq!(status, 0);
    assert_eq!(kernel.socket_count(), 0);
}

#[test]
fn test_write_shutdown_gives_peer_eof() {
    let status = boot(|k: &Kernel, _| {
        let listener = k.socket(81).unwrap();
        k.listen(listener).unwrap();

        let client_thread = k
            .create_thread(
                task(|k, _| {
                    let client = k.socket(NOPORT).unwrap();
                    k.connect(client, 81, None).unwrap();
                    k.write(client, b"last words").unwrap();
                    k.shutdown(client, ShutdownMode::Write).unwrap();

                    // The read direction still works.
                    let mut buf = [0u8; 2];
                    k.read(client, &mut buf).unwrap();
                    assert_eq!(&buf, b"ok");
                    k.close(client).unwrap();
                    0
                }),
                &[],
            )
            .unwrap();

        let conn = k.accept(listener).unwrap();
        let mut buf = [0u8; 64];
        let n = k.read(conn, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"last words");
        // A second read sees end of stream.
        assert_eq!(k.read(conn, &mut buf).unwrap(), 0);

        k.write(conn, b"ok").unwrap();
        assert_eq!(k.thread_join(client_thread), Ok(0));
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_read_after_read_shutdown_fails() {
    let status = boot(|k: &Kernel, _| {
        let listener = k.socket(82).unwrap();
        k.listen(listener).unwrap();

        let client_thread = k
            .create_thread(
                task(|k, _| {
                    let client = k.socket(NOPORT).unwrap();
                    k.connect(client, 82, None).unwrap();
                    k.shutdown(client, ShutdownMode::Read).unwrap();

                    let mut buf = [0u8; 4];
                    assert_eq!(
                        k.read(client, &mut buf).unwrap_err(),
                        KernelError::Socket(SocketError::NotConnected)
                    );
                    k.close(client).unwrap();
                    0
                }),
                &[],
            )
            .unwrap();

        let conn = k.accept(listener).unwrap();
        assert_eq!(k.thread_join(client_thread), Ok(0));
        k.close(conn).unwrap();
        k.close(listener).unwrap();
        0
    });
    assert_eq!(status, 0);
}

#[test]
#[serial]
fn test_listener_close_refuses_pending_connect() {
    let status = boot(|k: &Kernel, _| {
        let listener = k.socket(90).unwrap();
        k.listen(listener).unwrap();

        let client_thread = k
            .create_thread(
                task(|k, _| {
                    let client = k.socket(NOPORT).unwrap();
                    match k.connect(client, 90, None) {
                        Err(KernelError::Socket(SocketError::ConnectionRefused)) => 1,
                        other => panic!("expected a refusal, got {other:?}"),
                    }
                }),
                &[],
            )
            .unwrap();

        // Let the request land in the queue, then slam the door.
        std::thread::sleep(Duration::from_millis(50));
        k.close(listener).unwrap();

        assert_eq!(k.thread_join(client_thread), Ok(1));
        assert!(!k.port_bound(90));
        0
    });
    assert_eq!(status, 0);
}

#[test]
#[serial]
fn test_listener_close_unblocks_accept() {
    let status = boot(|k: &Kernel, _| {
        let listener = k.socket(91).unwrap();
        k.listen(listener).unwrap();

        let acceptor = k
            .create_thread(
                task(move |k, _| match k.accept(listener) {
                    Err(KernelError::Socket(SocketError::Closed)) => 1,
                    other => panic!("expected a closed listener, got {other:?}"),
                }),
                &[],
            )
            .unwrap();

        // Let the acceptor block on the empty queue, then deregister the
        // port out from under it.
        std::thread::sleep(Duration::from_millis(50));
        k.close(listener).unwrap();

        assert_eq!(k.thread_join(acceptor), Ok(1));
        assert!(!k.port_bound(91));
        assert_eq!(k.socket_count(), 0);
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_connect_across_processes() {
    let status = boot(|k: &Kernel, _| {
        let listener = k.socket(85).unwrap();
        k.listen(listener).unwrap();

        let child = k
            .exec(
                Some(task(|k, _| {
                    let client = k.socket(NOPORT).unwrap();
                    k.connect(client, 85, None).unwrap();

                    let mut buf = [0u8; 5];
                    k.read(client, &mut buf).unwrap();
                    assert_eq!(&buf, b"hello");
                    0
                })),
                &[],
            )
            .unwrap();

        let conn = k.accept(listener).unwrap();
        k.write(conn, b"hello").unwrap();
        let (_, status) = k.wait_child(Some(child)).unwrap();
        status
    });
    assert_eq!(status, 0);
}
