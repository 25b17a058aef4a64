use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use log::debug;

use crate::core::error::{DiagError, Result};

/// Holds a loopback port for as long as the interactive session lives.
#[derive(Debug)]
pub struct InstanceGuard {
    listener: TcpListener,
}

impl InstanceGuard {
    /// Claims `127.0.0.1:port`. `Ok(None)` means another session already holds it.
    pub fn acquire(port: u16) -> Result<Option<Self>> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        match TcpListener::bind(addr) {
            Ok(listener) => {
                debug!("Instance lock held on {}", addr);
                Ok(Some(Self { listener }))
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(None),
            Err(e) => Err(DiagError::IoError(e)),
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.listener.local_addr().ok().map(|addr| addr.port())
    }
}
