//! UDP driver - one text datagram per broadcast

use anyhow::{Context, Result};
use std::net::UdpSocket;
use tracing::trace;

use super::console::csv_line;
use crate::mapping::KeyValue;
use crate::target::Target;

/// Unconnected UDP socket bound on first use
#[derive(Default)]
pub(crate) struct LazySocket {
    socket: Option<UdpSocket>,
}

impl LazySocket {
    pub(crate) fn get(&mut self) -> Result<&UdpSocket> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind UDP socket")?;
            self.socket = Some(socket);
        }
        self.socket.as_ref().context("UDP socket unavailable")
    }
}

pub struct UdpDriver {
    socket: LazySocket,
}

impl UdpDriver {
    pub fn new() -> Self {
        Self {
            socket: LazySocket::default(),
        }
    }

    pub fn send(&mut self, target: &Target, property: &str, value: &KeyValue) -> Result<()> {
        let line = csv_line(property, value)?;
        let datagram = line.strip_suffix(b"\n").unwrap_or(line.as_slice());

        self.socket
            .get()?
            .send_to(datagram, target.socket_addr())
            .with_context(|| format!("Failed to send UDP to {}", target.socket_addr()))?;

        trace!("UDP → {} {}", target.socket_addr(), String::from_utf8_lossy(datagram));
        Ok(())
    }
}

impl Default for UdpDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_datagram_is_one_csv_line() {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        listener.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = listener.local_addr().unwrap().port();

        let target = Target::parse(&format!("udp://127.0.0.1:{}", port));
        let mut driver = UdpDriver::new();
        driver
            .send(&target, "pos", &KeyValue::Vector(vec![0.5, 1.0, 0.0]))
            .unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"pos,0.5,1,0");
    }

    #[test]
    fn test_unresolvable_address_fails() {
        let mut driver = UdpDriver::new();
        let target = Target::new(crate::target::Protocol::Udp, "no-port-here");
        assert!(driver.send(&target, "x", &KeyValue::Int(1)).is_err());
    }
}
