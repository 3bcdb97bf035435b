//! Bridges between async HTTP bodies and the blocking `Read` streams the
//! content template works with.
//!
//! Uploads: [`pump_stream`] forwards body chunks into a bounded channel that
//! a [`ChannelReader`] drains on a blocking thread. The stream only ends
//! cleanly after an explicit [`Frame::End`]; a channel that closes without
//! one (client disconnect, dropped handler) reads as `ConnectionAborted`, so
//! a truncated upload is never committed.
//!
//! Downloads: [`reader_body`] pumps a blocking reader into a channel backing
//! the response body.

use std::fmt;
use std::io::{self, Read};
use std::pin::pin;

use axum::body::Body;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Chunks buffered between the async and blocking halves.
pub const CHANNEL_CAPACITY: usize = 16;

/// One message on an upload channel.
#[derive(Debug)]
pub enum Frame {
    Data(Bytes),
    End,
}

pub type FrameSender = mpsc::Sender<io::Result<Frame>>;

/// Blocking reader over an upload channel.
#[derive(Debug)]
pub struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Frame>>,
    current: Bytes,
    done: bool,
}

/// Create a connected sender / reader pair.
pub fn channel() -> (FrameSender, ChannelReader) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let reader = ChannelReader {
        rx,
        current: Bytes::new(),
        done: false,
    };
    (tx, reader)
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if !self.current.is_empty() {
                let n = buf.len().min(self.current.len());
                let chunk = self.current.split_to(n);
                buf[..n].copy_from_slice(&chunk);
                return Ok(n);
            }
            if self.done {
                return Ok(0);
            }
            match self.rx.blocking_recv() {
                Some(Ok(Frame::Data(bytes))) => self.current = bytes,
                Some(Ok(Frame::End)) => self.done = true,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "request body ended before completion",
                    ))
                }
            }
        }
    }
}

/// Forward `stream` into `tx` until it ends, fails, or `deadline` passes.
///
/// Stops early when the reading side has gone away.
pub async fn pump_stream<S, E>(stream: S, tx: FrameSender, deadline: Instant)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
{
    let mut stream = pin!(stream);
    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => {
                debug!("upload reader finished early");
                return;
            }
            next = timeout_at(deadline, stream.next()) => next,
        };
        let frame = match next {
            Err(_) => {
                warn!("upload exceeded the commit window");
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "request body not received within the commit window",
                ))
            }
            Ok(None) => Ok(Frame::End),
            Ok(Some(Ok(bytes))) if bytes.is_empty() => continue,
            Ok(Some(Ok(bytes))) => Ok(Frame::Data(bytes)),
            Ok(Some(Err(e))) => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                format!("request body error: {e}"),
            )),
        };
        let last = !matches!(frame, Ok(Frame::Data(_)));
        if tx.send(frame).await.is_err() || last {
            return;
        }
    }
}

/// Stream a blocking reader as a response body.
pub fn reader_body(reader: Box<dyn Read + Send>, chunk_size: usize) -> Body {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || pump_reader(reader, tx, chunk_size));
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    Body::from_stream(stream)
}

fn pump_reader(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<io::Result<Bytes>>,
    chunk_size: usize,
) {
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let item = match reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "content read failed mid-download");
                Err(e)
            }
        };
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() {
            debug!("download receiver dropped");
            return;
        }
        if failed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn chunks(parts: &[&'static [u8]]) -> Vec<Result<Bytes, io::Error>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p))).collect()
    }

    async fn drain(mut reader: ChannelReader) -> io::Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).map(|_| out)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn complete_stream_reads_to_end() {
        let (tx, reader) = channel();
        let deadline = Instant::now() + Duration::from_secs(5);
        let stream = futures::stream::iter(chunks(&[&b"Hello "[..], &b""[..], &b"World!"[..]]));
        let (_, read) = tokio::join!(pump_stream(stream, tx, deadline), drain(reader));
        assert_eq!(read.unwrap(), b"Hello World!");
    }

    #[tokio::test]
    async fn dropped_sender_aborts() {
        let (tx, reader) = channel();
        tx.send(Ok(Frame::Data(Bytes::from_static(b"partial"))))
            .await
            .unwrap();
        drop(tx);
        let err = drain(reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn body_error_aborts() {
        let (tx, reader) = channel();
        let deadline = Instant::now() + Duration::from_secs(5);
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::new(io::ErrorKind::Other, "reset")),
        ]);
        let (_, read) = tokio::join!(pump_stream(stream, tx, deadline), drain(reader));
        assert_eq!(read.unwrap_err().kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn stalled_stream_times_out() {
        let (tx, reader) = channel();
        let deadline = Instant::now() + Duration::from_millis(50);
        let stream = futures::stream::pending::<Result<Bytes, io::Error>>();
        let (_, read) = tokio::join!(pump_stream(stream, tx, deadline), drain(reader));
        assert_eq!(read.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn pump_stops_when_reader_dropped() {
        let (tx, reader) = channel();
        drop(reader);
        let deadline = Instant::now() + Duration::from_secs(5);
        // A pending stream would block forever without the closed check.
        let stream = futures::stream::pending::<Result<Bytes, io::Error>>();
        tokio::time::timeout(Duration::from_secs(1), pump_stream(stream, tx, deadline))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reader_body_streams_everything() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let body = reader_body(Box::new(Cursor::new(data.clone())), 1024);
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), data.as_slice());
    }
}
