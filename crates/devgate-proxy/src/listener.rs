use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::error::ProxyError;

/// Ports tried after the configured one when the port is not strict
pub const MAX_PORT_ATTEMPTS: u16 = 100;

/// Resolve a host name to a listen address, preferring IPv4
pub fn resolve_listen_address(host: &str, port: u16) -> Result<SocketAddr, ProxyError> {
    let unresolvable = || ProxyError::UnresolvableHost {
        host: host.to_string(),
        port,
    };

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| unresolvable())?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(unresolvable)
}

/// Pick the address the server will listen on.
///
/// A busy port fails with [`ProxyError::PortInUse`] when `strict`; otherwise
/// the following ports are tried in order.
///
/// The test listener is released before returning because Pingora binds
/// `add_tcp` addresses itself and takes no pre-bound socket outside of
/// its upgrade fd transfer. Another process can take the port between this
/// check and the server's bind; the server then fails to start with
/// Pingora's bind error instead of [`ProxyError::PortInUse`].
pub fn bind_listener(host: &str, port: u16, strict: bool) -> Result<SocketAddr, ProxyError> {
    let mut addr = resolve_listen_address(host, port)?;
    let attempts = if strict { 1 } else { MAX_PORT_ATTEMPTS };
    let mut last = port;

    for offset in 0..attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        last = candidate;
        addr.set_port(candidate);

        match TcpListener::bind(addr) {
            Ok(listener) => {
                drop(listener);
                if candidate != port {
                    info!("Port {} is in use, using {} instead", port, candidate);
                }
                debug!("Listen address resolved to {}", addr);
                return Ok(addr);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                if strict {
                    warn!("Port {} is already in use and strictPort is set", port);
                    return Err(ProxyError::PortInUse {
                        host: host.to_string(),
                        port,
                    });
                }
                debug!("Port {} is in use, trying next", candidate);
            }
            Err(source) => {
                return Err(ProxyError::Bind {
                    address: addr.to_string(),
                    source,
                });
            }
        }
    }

    Err(ProxyError::NoFreePort {
        host: host.to_string(),
        first: port,
        last,
    })
}
