/*!
 * Pipe Tests
 * Blocking transfers, flow control, endpoint closure, and freeing
 */

mod common;

use common::{boot, boot_kernel};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tiny_os_kernel::{task, Kernel, KernelConfig, KernelError, PipeError};

#[test]
fn test_roundtrip_within_process() {
    let status = boot(|k, _| {
        let (r, w) = k.pipe().unwrap();
        assert_eq!(k.write(w, b"hello").unwrap(), 5);

        let mut buf = [0u8; 5];
        assert_eq!(k.read(r, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_read_returns_short_on_writer_close() {
    let status = boot(|k, _| {
        let (r, w) = k.pipe().unwrap();
        let reader = k
            .create_thread(
                task(move |k, _| {
                    let mut buf = [0u8; 64];
                    let n = k.read(r, &mut buf).unwrap();
                    assert_eq!(&buf[..n], b"end");
                    n as i32
                }),
                &[],
            )
            .unwrap();

        k.write(w, b"end").unwrap();
        k.close(w).unwrap();
        assert_eq!(k.thread_join(reader), Ok(3));
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_eof_read_returns_zero() {
    let status = boot(|k, _| {
        let (r, w) = k.pipe().unwrap();
        k.close(w).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(k.read(r, &mut buf).unwrap(), 0);
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_flow_control_through_tiny_buffer() {
    // A 32-byte message through an 8-byte ring forces the writer to block
    // and refill repeatedly.
    let config = KernelConfig::default().with_pipe_capacity(8);
    let status = boot_kernel(config, |k, _| {
        let (r, w) = k.pipe().unwrap();
        let data: Vec<u8> = (0u8..32).collect();

        let expected = data.clone();
        let writer = k
            .create_thread(
                task(move |k, _| k.write(w, &expected).unwrap() as i32),
                &[],
            )
            .unwrap();

        let mut buf = [0u8; 32];
        assert_eq!(k.read(r, &mut buf).unwrap(), 32);
        assert_eq!(&buf[..], &data[..]);
        assert_eq!(k.thread_join(writer), Ok(32));
        0
    })
    .1;
    assert_eq!(status, 0);
}

#[test]
fn test_write_to_closed_reader_fails() {
    let status = boot(|k, _| {
        let (r, w) = k.pipe().unwrap();
        k.close(r).unwrap();
        // The reader was gone before the transfer started; this is an
        // error, not a short count.
        assert!(matches!(
            k.write(w, b"nobody listening").unwrap_err(),
            KernelError::Pipe(PipeError::ReaderClosed(_))
        ));
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_reader_close_unblocks_writer_with_progress() {
    let config = KernelConfig::default().with_pipe_capacity(8);
    let status = boot_kernel(config, |k, _| {
        let (r, w) = k.pipe().unwrap();
        let writer = k
            .create_thread(
                task(move |k, _| k.write(w, &[0u8; 32]).unwrap() as i32),
                &[],
            )
            .unwrap();

        // Take a few bytes, then walk away mid-message.
        let mut buf = [0u8; 4];
        assert_eq!(k.read(r, &mut buf).unwrap(), 4);
        k.close(r).unwrap();

        let written = k.thread_join(writer).unwrap();
        assert!(written >= 4 && written < 32, "got {written}");
        0
    })
    .1;
    assert_eq!(status, 0);
}

#[test]
fn test_pipe_freed_when_both_ends_close() {
    let (kernel, status) = boot_kernel(KernelConfig::default(), |k, _| {
        let (r, w) = k.pipe().unwrap();
        assert_eq!(k.pipe_count(), 1);
        k.close(r).unwrap();
        assert_eq!(k.pipe_count(), 1);
        k.close(w).unwrap();
        assert_eq!(k.pipe_count(), 0);
        0
    });
    assert_eq!(status, 0);
    assert_eq!(kernel.pipe_count(), 0);
}

#[test]
fn test_inherited_pipe_crosses_processes() {
    let status = boot(|k, _| {
        let (r, w) = k.pipe().unwrap();
        let child = k
            .exec(
                Some(task(move |k, _| {
                    k.write(w, b"ping").unwrap();
                    0
                })),
                &[],
            )
            .unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(k.read(r, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ping");
        k.wait_child(Some(child)).unwrap();
        0
    });
    assert_eq!(status, 0);
}

#[test]
fn test_process_exit_closes_inherited_ends() {
    let (kernel, status) = boot_kernel(KernelConfig::default(), |k, _| {
        let (r, w) = k.pipe().unwrap();
        let child = k
            .exec(
                Some(task(move |k, _| {
                    k.write(w, b"bye").unwrap();
                    0
                })),
                &[],
            )
            .unwrap();
        // Drop our ends; the child's inherited references keep the pipe
        // alive until it exits.
        k.close(w).unwrap();

        let mut buf = [0u8; 64];
        let n = k.read(r, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"bye");
        k.close(r).unwrap();
        k.wait_child(Some(child)).unwrap();
        assert_eq!(k.pipe_count(), 0);
        0
    });
    assert_eq!(status, 0);
    assert_eq!(kernel.pipe_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Byte order survives arbitrary payloads through a ring small enough
    // to force wraparound and blocking.
    #[test]
    fn prop_pipe_preserves_byte_order(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let config = KernelConfig::default().with_pipe_capacity(64);
        let status = boot_kernel(config, move |k: &Kernel, _: &[u8]| {
            let (r, w) = k.pipe().unwrap();
            let payload = data.clone();
            let len = payload.len();

            let writer = k
                .create_thread(task(move |k, _| k.write(w, &payload).unwrap() as i32), &[])
                .unwrap();

            let mut buf = vec![0u8; len];
            let n = k.read(r, &mut buf).unwrap();
            let ok = n == len && buf == data && k.thread_join(writer) == Ok(len as i32);
            if ok { 0 } else { 1 }
        })
        .1;
        prop_assert_eq!(status, 0);
    }
}
