//! Datagram transport abstraction
//!
//! The stream sender writes whole datagrams through [`DatagramTransport`].
//! [`UdpTransport`] sends to one fixed destination; [`MockTransport`]
//! records datagrams for tests.

use crate::error::Result;

mod mock;
mod udp;
pub use mock::{MockTransport, SentDatagram};
pub use udp::UdpTransport;

/// One-destination, fire-and-forget datagram sink
pub trait DatagramTransport: Send {
    /// Send one datagram, returning the number of bytes written
    ///
    /// Each call is independent: a failure affects only this datagram.
    fn send(&mut self, datagram: &[u8]) -> Result<usize>;

    /// Release the underlying socket; later sends fail
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: DatagramTransport + ?Sized> DatagramTransport for Box<T> {
    fn send(&mut self, datagram: &[u8]) -> Result<usize> {
        (**self).send(datagram)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
