use crate::wol::{Datagram, Dialer};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Dials real UDP sockets with broadcast enabled.
pub struct UdpDialer;

impl Dialer for UdpDialer {
    fn dial(&self, target: SocketAddr) -> io::Result<Box<dyn Datagram>> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_broadcast(true)?;
        socket.connect(target)?;
        Ok(Box::new(socket))
    }
}

impl Datagram for UdpSocket {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, payload)
    }
}
