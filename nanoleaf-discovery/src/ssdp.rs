//! SSDP wire format for Nanoleaf controllers
//!
//! Only the message shapes the controllers actually emit are understood:
//! search replies (`HTTP/1.1 200 OK`) and presence notifications
//! (`NOTIFY * HTTP/1.1`). Headers are flattened into a lower-cased map.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// SSDP multicast group
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// SSDP multicast port
pub const MULTICAST_PORT: u16 = 1900;

/// Search target that asks every device to answer
pub const SEARCH_ALL: &str = "ssdp:all";

/// Pseudo-header holding the source address of the packet
pub const ADDRESS_HEADER: &str = "address";

const REPLY_LINE: &str = "HTTP/1.1 200 OK";
const NOTIFY_LINE: &str = "NOTIFY * HTTP/1.1";

/// Flat header map with lower-cased, trimmed keys
pub type Headers = HashMap<String, String>;

/// Build the M-SEARCH datagram for a search target
pub fn search_message(search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         Host:{}:{}\r\n\
         ST:{}\r\n\
         Man:\"ssdp:discover\"\r\n\
         MX:2\r\n\
         \r\n",
        MULTICAST_ADDR, MULTICAST_PORT, search_target
    )
}

/// Parse a packet whose first line must equal `start_line`.
///
/// Lines without a colon, or with an empty key, are skipped instead of
/// failing the packet. The source address is added as the `address` header.
pub fn parse_headers(packet: &str, start_line: &str, source: IpAddr) -> Option<Headers> {
    let mut lines = packet.lines();
    if lines.next()?.trim() != start_line {
        return None;
    }

    let mut headers = Headers::new();
    for line in lines {
        let Some(idx) = line.find(':') else {
            continue;
        };
        let key = line[..idx].trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        headers.insert(key, line[idx + 1..].trim().to_string());
    }
    headers.insert(ADDRESS_HEADER.to_string(), source.to_string());

    Some(headers)
}

/// Availability announced by a presence notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    /// `ssdp:alive`
    Alive,
    /// `ssdp:byebye`
    ByeBye,
    /// `ssdp:update`
    Update,
}

impl Availability {
    /// Map an `NTS` header value
    pub fn from_nts(nts: &str) -> Option<Self> {
        match nts {
            "ssdp:alive" => Some(Availability::Alive),
            "ssdp:byebye" => Some(Availability::ByeBye),
            "ssdp:update" => Some(Availability::Update),
            _ => None,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Availability::Alive => "available",
            Availability::ByeBye => "unavailable",
            Availability::Update => "update",
        };
        f.write_str(label)
    }
}

/// Reply to an active M-SEARCH
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReply {
    pub search_target: String,
    pub usn: Option<String>,
    pub location: String,
    pub device_name: Option<String>,
    pub address: IpAddr,
    pub headers: Headers,
}

impl SearchReply {
    /// Parse a search reply; `ST` and `LOCATION` are required
    pub fn parse(packet: &str, source: IpAddr) -> Option<Self> {
        let headers = parse_headers(packet, REPLY_LINE, source)?;
        let search_target = headers.get("st")?.clone();
        let location = headers.get("location")?.clone();

        Some(Self {
            search_target,
            usn: headers.get("usn").cloned(),
            location,
            device_name: headers.get("nl-devicename").cloned(),
            address: source,
            headers,
        })
    }
}

/// Unsolicited presence notification
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: Availability,
    pub notification_type: String,
    pub usn: String,
    pub location: Option<String>,
    pub address: IpAddr,
    pub headers: Headers,
}

impl Notification {
    /// Parse a `NOTIFY` packet; `NT` and a known `NTS` are required
    pub fn parse(packet: &str, source: IpAddr) -> Option<Self> {
        let headers = parse_headers(packet, NOTIFY_LINE, source)?;
        let kind = Availability::from_nts(headers.get("nts")?)?;
        let notification_type = headers.get("nt")?.clone();

        Some(Self {
            kind,
            notification_type,
            usn: headers.get("usn").cloned().unwrap_or_default(),
            location: headers.get("location").cloned(),
            address: source,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn source() -> IpAddr {
        "10.0.0.5".parse().unwrap()
    }

    #[test]
    fn test_search_message_format() {
        let msg = search_message("nanoleaf:nl29");
        assert!(msg.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(msg.contains("Host:239.255.255.250:1900\r\n"));
        assert!(msg.contains("ST:nanoleaf:nl29\r\n"));
        assert!(msg.contains("Man:\"ssdp:discover\"\r\n"));
        assert!(msg.contains("MX:2\r\n"));
        assert!(msg.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_parse_headers_lowercases_and_trims() {
        let packet = "HTTP/1.1 200 OK\r\nCache-Control:  max-age=60 \r\n  ST :nanoleaf:nl42\r\n\r\n";
        let headers = parse_headers(packet, REPLY_LINE, source()).unwrap();

        assert_eq!(headers.get("cache-control").unwrap(), "max-age=60");
        assert_eq!(headers.get("st").unwrap(), "nanoleaf:nl42");
        assert_eq!(headers.get("address").unwrap(), "10.0.0.5");
    }

    #[test]
    fn test_parse_headers_skips_malformed_lines() {
        let packet = "HTTP/1.1 200 OK\r\nthis line has no colon\r\n:no-key\r\nST:nanoleaf:nl29\r\n";
        let headers = parse_headers(packet, REPLY_LINE, source()).unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("st").unwrap(), "nanoleaf:nl29");
    }

    #[test]
    fn test_parse_headers_keeps_colons_in_value() {
        let packet = "HTTP/1.1 200 OK\r\nLOCATION: http://10.0.0.5:16021\r\n";
        let headers = parse_headers(packet, REPLY_LINE, source()).unwrap();
        assert_eq!(headers.get("location").unwrap(), "http://10.0.0.5:16021");
    }

    #[rstest]
    #[case("HTTP/1.1 404 Not Found\r\nST:nanoleaf:nl29\r\n")]
    #[case("NOTIFY * HTTP/1.1\r\nST:nanoleaf:nl29\r\n")]
    #[case("")]
    fn test_reply_rejects_wrong_start_line(#[case] packet: &str) {
        assert!(SearchReply::parse(packet, source()).is_none());
    }

    #[test]
    fn test_parse_search_reply() {
        let packet = "HTTP/1.1 200 OK\r\n\
                      Cache-Control: max-age=60\r\n\
                      ST:nanoleaf:nl29\r\n\
                      USN:uuid:b8f2c9f4-0000::nanoleaf:nl29\r\n\
                      LOCATION:http://10.0.0.5:16021\r\n\
                      nl-deviceid:AA:BB:CC:DD:EE:FF\r\n\
                      nl-devicename:Canvas 4A2B\r\n\r\n";
        let reply = SearchReply::parse(packet, source()).unwrap();

        assert_eq!(reply.search_target, "nanoleaf:nl29");
        assert_eq!(reply.location, "http://10.0.0.5:16021");
        assert_eq!(reply.device_name.as_deref(), Some("Canvas 4A2B"));
        assert_eq!(reply.usn.as_deref(), Some("uuid:b8f2c9f4-0000::nanoleaf:nl29"));
        assert_eq!(reply.headers.get("nl-deviceid").unwrap(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_parse_search_reply_requires_location() {
        let packet = "HTTP/1.1 200 OK\r\nST:nanoleaf:nl29\r\n";
        assert!(SearchReply::parse(packet, source()).is_none());
    }

    #[rstest]
    #[case("ssdp:alive", Availability::Alive)]
    #[case("ssdp:byebye", Availability::ByeBye)]
    #[case("ssdp:update", Availability::Update)]
    fn test_parse_notification_kinds(#[case] nts: &str, #[case] expected: Availability) {
        let packet = format!(
            "NOTIFY * HTTP/1.1\r\nHost: 239.255.255.250:1900\r\nNT: nanoleaf:nl42\r\nNTS: {}\r\nUSN: uuid:1234\r\nLocation: http://10.0.0.7:16021\r\n\r\n",
            nts
        );
        let notification = Notification::parse(&packet, source()).unwrap();

        assert_eq!(notification.kind, expected);
        assert_eq!(notification.notification_type, "nanoleaf:nl42");
        assert_eq!(notification.usn, "uuid:1234");
        assert_eq!(notification.location.as_deref(), Some("http://10.0.0.7:16021"));
        assert_eq!(notification.address, source());
    }

    #[test]
    fn test_parse_notification_unknown_nts() {
        let packet = "NOTIFY * HTTP/1.1\r\nNT: nanoleaf:nl42\r\nNTS: ssdp:propchange\r\n";
        assert!(Notification::parse(packet, source()).is_none());
    }

    #[test]
    fn test_availability_display() {
        assert_eq!(Availability::Alive.to_string(), "available");
        assert_eq!(Availability::ByeBye.to_string(), "unavailable");
    }
}
