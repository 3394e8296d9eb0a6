//! Décodage des datagrammes SSDP

use std::collections::HashMap;
use std::net::SocketAddr;

use tracing::trace;

use super::MAX_AGE;

/// Événements SSDP intéressants pour un control point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpEvent {
    Alive {
        usn: String,
        nt: String,
        location: String,
        server: String,
        max_age: u32,
        from: SocketAddr,
    },
    ByeBye {
        usn: String,
        nt: String,
        from: SocketAddr,
    },
    SearchResponse {
        usn: String,
        st: String,
        location: String,
        server: String,
        max_age: u32,
        from: SocketAddr,
    },
}

impl SsdpEvent {
    pub fn usn(&self) -> &str {
        match self {
            SsdpEvent::Alive { usn, .. }
            | SsdpEvent::ByeBye { usn, .. }
            | SsdpEvent::SearchResponse { usn, .. } => usn,
        }
    }
}

/// Decodes one datagram. M-SEARCH requests from other control points and
/// anything missing a mandatory header yield `None`.
pub fn parse_message(data: &str, from: SocketAddr) -> Option<SsdpEvent> {
    let mut lines = data.lines();
    let first_line = lines.next()?.trim();
    let upper = first_line.to_ascii_uppercase();
    let headers = parse_headers(lines);

    if upper.starts_with("NOTIFY ") {
        parse_notify(&headers, from)
    } else if upper.starts_with("HTTP/") && upper.contains(" 200") {
        parse_search_response(&headers, from)
    } else {
        trace!("Ignoring SSDP message from {}: {}", from, first_line);
        None
    }
}

/// Extracts the lower-cased `uuid:...` part of a USN.
///
/// `uuid:abc::urn:schemas-upnp-org:device:MediaServer:1` gives `uuid:abc`.
pub fn udn_from_usn(usn: &str) -> Option<String> {
    let lower = usn.trim().to_ascii_lowercase();
    let start = lower.find("uuid:")?;
    let udn = &lower[start..];
    match udn.find("::") {
        Some(end) => Some(udn[..end].to_string()),
        None => Some(udn.to_string()),
    }
}

fn parse_notify(headers: &HashMap<String, String>, from: SocketAddr) -> Option<SsdpEvent> {
    let nts = headers.get("NTS")?.to_ascii_lowercase();
    let nt = headers.get("NT")?.clone();
    let usn = headers.get("USN")?.clone();

    match nts.as_str() {
        "ssdp:alive" => Some(SsdpEvent::Alive {
            usn,
            nt,
            location: headers.get("LOCATION")?.clone(),
            server: server_header(headers),
            max_age: parse_max_age(headers.get("CACHE-CONTROL")),
            from,
        }),
        "ssdp:byebye" => Some(SsdpEvent::ByeBye { usn, nt, from }),
        _ => {
            trace!("Unknown NTS value from {}: {}", from, nts);
            None
        }
    }
}

fn parse_search_response(
    headers: &HashMap<String, String>,
    from: SocketAddr,
) -> Option<SsdpEvent> {
    Some(SsdpEvent::SearchResponse {
        usn: headers.get("USN")?.clone(),
        st: headers.get("ST")?.clone(),
        location: headers.get("LOCATION")?.clone(),
        server: server_header(headers),
        max_age: parse_max_age(headers.get("CACHE-CONTROL")),
        from,
    })
}

fn server_header(headers: &HashMap<String, String>) -> String {
    headers
        .get("SERVER")
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string())
}

fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        // Values may contain ':' (LOCATION), split on the first one only
        let Some((name, value)) = line.split_once(':') else {
            trace!("Skipping line without colon: '{}'", line);
            continue;
        };
        let name = name.trim().to_ascii_uppercase();
        let value = value.trim();
        if !name.is_empty() && !value.is_empty() {
            headers.insert(name, value.to_string());
        }
    }
    headers
}

fn parse_max_age(value: Option<&String>) -> u32 {
    let Some(value) = value else {
        return MAX_AGE;
    };
    let lower = value.to_ascii_lowercase();
    lower
        .find("max-age")
        .map(|idx| &lower[idx + "max-age".len()..])
        .map(|rest| rest.trim_start().trim_start_matches('=').trim_start())
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        })
        .unwrap_or(MAX_AGE)
}
