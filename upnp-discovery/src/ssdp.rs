//! SSDP M-SEARCH client and NOTIFY listener.
//!
//! Internal to the crate: [`SsdpClient`] sends a search for one device type
//! and yields the unicast responses until the socket read timeout expires.
//! [`NotifyListener`] joins the multicast group and reads the `ssdp:alive`
//! and `ssdp:byebye` announcements devices send on their own.

use crate::error::{DiscoveryError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";
const SSDP_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_PORT: u16 = 1900;

/// Seconds a device may wait before answering a search.
const SEARCH_MX: u32 = 2;

/// One answer to an M-SEARCH request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SsdpResponse {
    pub location: String,
    pub search_target: String,
    pub usn: String,
    pub server: Option<String>,
}

pub(crate) struct SsdpClient {
    socket: UdpSocket,
}

impl SsdpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to bind UDP socket: {}", e)))?;

        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set read timeout: {}", e)))?;

        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set multicast loop: {}", e)))?;

        Ok(Self { socket })
    }

    /// Send an M-SEARCH for `search_target` and iterate over the responses.
    pub fn search(&self, search_target: &str) -> Result<SsdpResponseIterator<'_>> {
        let request = build_search_request(search_target);

        self.socket
            .send_to(request.as_bytes(), SSDP_MULTICAST_ADDR)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to send M-SEARCH: {}", e)))?;

        Ok(SsdpResponseIterator::new(&self.socket))
    }
}

fn build_search_request(search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: mediacp/0.1 UPnP/1.0\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SEARCH_MX, search_target
    )
}

pub(crate) struct SsdpResponseIterator<'a> {
    socket: &'a UdpSocket,
    buffer: [u8; 2048],
    finished: bool,
}

impl<'a> SsdpResponseIterator<'a> {
    fn new(socket: &'a UdpSocket) -> Self {
        Self {
            socket,
            buffer: [0; 2048],
            finished: false,
        }
    }
}

impl<'a> Iterator for SsdpResponseIterator<'a> {
    type Item = Result<SsdpResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((size, _)) => {
                    // Malformed datagrams are skipped silently
                    let Ok(text) = std::str::from_utf8(&self.buffer[..size]) else {
                        continue;
                    };
                    if let Some(response) = parse_ssdp_response(text) {
                        return Some(Ok(response));
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    self.finished = true;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(DiscoveryError::NetworkError(format!("Socket error: {}", e))));
                }
            }
        }
        None
    }
}

/// Parse the headers of an SSDP search response.
///
/// Returns `None` unless LOCATION, ST and USN are all present.
pub(crate) fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut search_target = None;
    let mut usn = None;
    let mut server = None;

    for line in response.lines() {
        let line = line.trim();

        if let Some(value) = extract_header_value(line, "LOCATION:") {
            location = Some(value);
        } else if let Some(value) = extract_header_value(line, "ST:") {
            search_target = Some(value);
        } else if let Some(value) = extract_header_value(line, "USN:") {
            usn = Some(value);
        } else if let Some(value) = extract_header_value(line, "SERVER:") {
            server = Some(value);
        }
    }

    Some(SsdpResponse {
        location: location?,
        search_target: search_target?,
        usn: usn?,
        server,
    })
}

/// An unsolicited SSDP announcement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SsdpNotification {
    Alive {
        notification_type: String,
        usn: String,
        location: String,
    },
    ByeBye {
        notification_type: String,
        usn: String,
    },
}

impl SsdpNotification {
    /// The UDN part of the USN, e.g. `uuid:abc` for `uuid:abc::upnp:rootdevice`.
    pub fn udn(&self) -> &str {
        let usn = match self {
            SsdpNotification::Alive { usn, .. } | SsdpNotification::ByeBye { usn, .. } => usn,
        };
        usn.split("::").next().unwrap_or_default()
    }
}

/// Parse a `NOTIFY * HTTP/1.1` datagram.
///
/// Returns `None` for other messages, unknown NTS values, and announcements
/// missing NT or USN. An alive without LOCATION is dropped as well.
pub(crate) fn parse_ssdp_notify(message: &str) -> Option<SsdpNotification> {
    let mut lines = message.lines();
    let request_line = lines.next()?.trim();
    if !request_line.to_ascii_uppercase().starts_with("NOTIFY ") {
        return None;
    }

    let mut notification_type = None;
    let mut sub_type = None;
    let mut usn = None;
    let mut location = None;

    for line in lines {
        let line = line.trim();

        if let Some(value) = extract_header_value(line, "NTS:") {
            sub_type = Some(value);
        } else if let Some(value) = extract_header_value(line, "NT:") {
            notification_type = Some(value);
        } else if let Some(value) = extract_header_value(line, "USN:") {
            usn = Some(value);
        } else if let Some(value) = extract_header_value(line, "LOCATION:") {
            location = Some(value);
        }
    }

    let notification_type = notification_type?;
    let usn = usn?;
    match sub_type?.to_ascii_lowercase().as_str() {
        "ssdp:alive" => Some(SsdpNotification::Alive {
            notification_type,
            usn,
            location: location?,
        }),
        "ssdp:byebye" => Some(SsdpNotification::ByeBye { notification_type, usn }),
        _ => None,
    }
}

/// Socket bound to the SSDP port and joined to the multicast group.
pub(crate) struct NotifyListener {
    socket: UdpSocket,
    buffer: [u8; 2048],
}

impl NotifyListener {
    /// Bind `0.0.0.0:1900` with address reuse, so other SSDP stacks on the
    /// host keep working. Reads time out after `poll` so the caller can check
    /// for shutdown.
    pub fn bind(poll: Duration) -> Result<Self> {
        let network =
            |what: &str, e: std::io::Error| DiscoveryError::NetworkError(format!("{}: {}", what, e));

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| network("Failed to create NOTIFY socket", e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| network("Failed to set address reuse", e))?;
        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, SSDP_PORT));
        socket
            .bind(&address.into())
            .map_err(|e| network("Failed to bind SSDP port", e))?;

        let socket: UdpSocket = socket.into();
        socket
            .join_multicast_v4(&SSDP_MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| network("Failed to join SSDP group", e))?;
        socket
            .set_read_timeout(Some(poll))
            .map_err(|e| network("Failed to set read timeout", e))?;

        Ok(Self {
            socket,
            buffer: [0; 2048],
        })
    }

    /// Wait up to the poll interval for the next announcement.
    ///
    /// `Ok(None)` when the interval passed or the datagram was not a NOTIFY.
    pub fn next_notification(&mut self) -> Result<Option<SsdpNotification>> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((size, _)) => Ok(std::str::from_utf8(&self.buffer[..size])
                .ok()
                .and_then(parse_ssdp_notify)),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(DiscoveryError::NetworkError(format!("Socket error: {}", e))),
        }
    }
}

fn extract_header_value(line: &str, header: &str) -> Option<String> {
    if line.len() > header.len() && line[..header.len()].eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}
