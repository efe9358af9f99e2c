pub mod udp;

use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use rouille::Response;
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

// Wake-on-LAN listeners conventionally sit on the discard port.
pub const DISCARD_PORT: u16 = 9;
const SYNCHRONIZATION_SCHEME: [u8; 6] = [0xff; 6];
const REPETITIONS: usize = 16;

pub const MAGIC_PACKET_LEN: usize = SYNCHRONIZATION_SCHEME.len() + REPETITIONS * 6;

lazy_static! {
    // Six two-digit hex groups joined by a single, uniform separator.
    static ref MAC_48: Regex = Regex::new(
        r"^[0-9a-fA-F]{2}(:[0-9a-fA-F]{2}){5}$|^[0-9a-fA-F]{2}(-[0-9a-fA-F]{2}){5}$"
    )
    .unwrap();
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} is not a IEEE 802 MAC-48 address")]
    InvalidAddressFormat(String),
    #[error("could not resolve broadcast target {target}")]
    UnresolvableTarget {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("socket error: {0}")]
    SocketError(#[from] io::Error),
    #[error("sent {0} bytes (expected 102 bytes)")]
    ShortWrite(usize),
}

impl Error {
    /// Short label for the stage that failed, used for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidAddressFormat(_) => "invalid_address",
            Self::UnresolvableTarget { .. } => "unresolvable_target",
            Self::SocketError(_) => "socket_error",
            Self::ShortWrite(_) => "short_write",
        }
    }
}

impl From<Error> for Response {
    fn from(e: Error) -> Self {
        Response::text(e.to_string()).with_status_code(500)
    }
}

/// A 6 byte IEEE 802 MAC-48 address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Parses `xx:xx:xx:xx:xx:xx` or `xx-xx-xx-xx-xx-xx`.
    ///
    /// The text has to decode as a generic hardware address and also match the
    /// strict MAC-48 form. The generic decoder on its own is lenient about
    /// single digit groups, sign prefixes and mixed separators.
    pub fn parse(text: &str) -> Result<MacAddress, Error> {
        let invalid = || Error::InvalidAddressFormat(text.to_string());
        let hw_addr: mac_address::MacAddress = text.parse().map_err(|_| invalid())?;
        if !MAC_48.is_match(text) {
            return Err(invalid());
        }
        Ok(MacAddress(hw_addr.bytes()))
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Six bytes of 0xff followed by sixteen copies of the target address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagicPacket {
    mac_address: MacAddress,
}

impl MagicPacket {
    pub fn new(mac_address: MacAddress) -> Self {
        Self { mac_address }
    }

    pub fn to_bytes(&self) -> [u8; MAGIC_PACKET_LEN] {
        let mut data = [0u8; MAGIC_PACKET_LEN];
        let (header, payload) = data.split_at_mut(SYNCHRONIZATION_SCHEME.len());
        header.copy_from_slice(&SYNCHRONIZATION_SCHEME);
        for slot in payload.chunks_exact_mut(6) {
            slot.copy_from_slice(&self.mac_address.bytes());
        }
        data
    }
}

/// A connected datagram socket. Dropping it releases the socket.
pub trait Datagram {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize>;
}

/// Opens datagram sockets aimed at a single destination.
pub trait Dialer: Send + Sync {
    fn dial(&self, target: SocketAddr) -> io::Result<Box<dyn Datagram>>;
}

fn resolve(target: &str) -> Result<SocketAddr, Error> {
    let unresolvable = |source| Error::UnresolvableTarget {
        target: target.to_string(),
        source,
    };
    let addrs: Vec<SocketAddr> = target.to_socket_addrs().map_err(unresolvable)?.collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            unresolvable(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses returned",
            ))
        })
}

/// Sends one magic packet for `mac_address` to `broadcast`, a `host:port` pair.
///
/// Success only means the datagram was handed to the network stack.
pub fn send_magic_packet(
    dialer: &dyn Dialer,
    mac_address: &str,
    broadcast: &str,
) -> Result<(), Error> {
    let target = resolve(broadcast)?;
    let mac = MacAddress::parse(mac_address)?;
    let packet = MagicPacket::new(mac).to_bytes();

    let mut conn = dialer.dial(target)?;
    info!("Sending magic packet to: {}", mac);
    info!("Broadcasting via: {} ({})", broadcast, target);
    let sent = conn.send(&packet)?;
    if sent != MAGIC_PACKET_LEN {
        return Err(Error::ShortWrite(sent));
    }
    info!("Magic packet sent");
    Ok(())
}

/// Formats a bare broadcast host as a target on the discard port.
pub fn broadcast_target(host: &str) -> String {
    format!("{}:{}", host, DISCARD_PORT)
}
