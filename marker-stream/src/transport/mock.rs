//! Mock transport for testing

use super::DatagramTransport;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// A datagram captured by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct SentDatagram {
    pub bytes: Vec<u8>,
    pub sent_at: Instant,
}

/// Mock transport recording every datagram
///
/// Clones share the same record, so a test can keep one handle while the
/// sender owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    sent: Vec<SentDatagram>,
    /// Outcome script for upcoming sends; `true` fails that send
    failures: VecDeque<bool>,
    fail_all: bool,
    closed: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `count` sends
    pub fn fail_next(&self, count: usize) {
        self.lock().failures.extend(std::iter::repeat(true).take(count));
    }

    /// Let `count` sends succeed, then fail the one after
    pub fn fail_after(&self, count: usize) {
        let mut inner = self.lock();
        inner.failures.extend(std::iter::repeat(false).take(count));
        inner.failures.push_back(true);
    }

    /// Fail every send until turned off
    pub fn set_fail_all(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// All datagrams sent successfully so far
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.lock().sent.clone()
    }

    /// Bytes of all datagrams sent successfully so far
    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        self.lock().sent.iter().map(|d| d.bytes.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl DatagramTransport for MockTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<usize> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::Transport("socket closed".to_string()));
        }
        let scripted = inner.failures.pop_front().unwrap_or(false);
        if scripted || inner.fail_all {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "injected send failure",
            )));
        }
        inner.sent.push(SentDatagram {
            bytes: datagram.to_vec(),
            sent_at: Instant::now(),
        });
        Ok(datagram.len())
    }

    fn close(&mut self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}
