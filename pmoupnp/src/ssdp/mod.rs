//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Control-point side of SSDP: multicast M-SEARCH requests and decoding of the
//! NOTIFY / HTTP 200 datagrams devices send back.
//!
//! ## Constants SSDP
//!
//! - **Multicast Address**: 239.255.255.250:1900
//! - **Max-Age** par défaut : 1800 secondes

mod client;
mod message;

pub use client::SsdpClient;
pub use message::{SsdpEvent, parse_message, udn_from_usn};

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Durée de validité des annonces quand CACHE-CONTROL est absent (en secondes)
pub const MAX_AGE: u32 = 1800;
