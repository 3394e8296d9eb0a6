/*!
The SSDP client is a *control point*: it never binds UDP port 1900.

It binds an ephemeral port, sends M-SEARCH to the multicast group and receives
the unicast HTTP/200 replies on that port. It still joins the multicast group on
every non-loopback IPv4 interface so that NOTIFY announcements reaching the
socket are decoded too.
*/

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use super::message::{SsdpEvent, parse_message};
use super::{SSDP_MULTICAST_ADDR, SSDP_PORT};

const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Client SSDP pour envoyer des M-SEARCH et écouter les réponses
pub struct SsdpClient {
    socket: UdpSocket,
    user_agent: String,
}

impl SsdpClient {
    /// Crée un client SSDP sur un port éphémère.
    ///
    /// `poll_interval` bounds how long [`SsdpClient::next_event`] blocks, so
    /// that the owning thread can notice a shutdown request.
    pub fn new(user_agent: &str, poll_interval: Duration) -> io::Result<Self> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket2.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket2.into();
        socket.set_read_timeout(Some(poll_interval))?;
        socket.set_multicast_loop_v4(true)?;

        for iface in get_if_addrs::get_if_addrs()? {
            if let std::net::IpAddr::V4(ipv4) = iface.ip() {
                if ipv4.is_loopback() {
                    continue;
                }
                match socket.join_multicast_v4(&MULTICAST_GROUP, &ipv4) {
                    Ok(()) => debug!("SSDP: joined {} on {}", SSDP_MULTICAST_ADDR, ipv4),
                    Err(e) => warn!(
                        "SSDP: failed to join {} on {}: {}",
                        SSDP_MULTICAST_ADDR, ipv4, e
                    ),
                }
            }
        }

        info!(
            local = ?socket.local_addr().ok(),
            "✅ SSDP client ready"
        );

        Ok(Self {
            socket,
            user_agent: user_agent.to_string(),
        })
    }

    /// Envoie un M-SEARCH pour un type donné
    pub fn send_msearch(&self, st: &str, mx: u32) -> io::Result<()> {
        let msg = msearch_message(st, mx, &self.user_agent);
        let target = SocketAddr::V4(SocketAddrV4::new(MULTICAST_GROUP, SSDP_PORT));

        self.socket.send_to(msg.as_bytes(), target)?;
        debug!("📤 M-SEARCH sent (ST={}, MX={})", st, mx.max(1));
        trace!("M-SEARCH payload:\n{}", msg);
        Ok(())
    }

    /// Waits for the next datagram, up to the poll interval.
    ///
    /// Returns `Ok(None)` on timeout and for datagrams that are not a
    /// recognisable NOTIFY or search response.
    pub fn next_event(&self) -> io::Result<Option<SsdpEvent>> {
        let mut buf = [0u8; 8192];
        match self.socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                let data = String::from_utf8_lossy(&buf[..n]);
                let event = parse_message(&data, from);
                if let Some(event) = &event {
                    trace!("📥 SSDP event from {}: {:?}", from, event);
                }
                Ok(event)
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn msearch_message(st: &str, mx: u32, user_agent: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: {}\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR,
        SSDP_PORT,
        mx.max(1),
        st,
        user_agent
    )
}
