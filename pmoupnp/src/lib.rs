//! # pmoupnp - UPnP control point plumbing
//!
//! The two protocol layers a UPnP control point needs before it can talk to a
//! MediaServer:
//!
//! - [`ssdp`] : M-SEARCH emission and parsing of NOTIFY / search responses
//! - [`soap`] : construction of action requests and decoding of responses and faults

pub mod soap;
pub mod ssdp;
