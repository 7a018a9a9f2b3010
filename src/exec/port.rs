// src/exec/port.rs

//! Free-port negotiation for the program and the debugger.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, warn};

use crate::errors::{DevloopError, Result};

pub const PORT_FREE_TIMEOUT: Duration = Duration::from_secs(5);
pub const PORT_FREE_POLL: Duration = Duration::from_millis(500);

/// Return `preferred` if it can be bound right now, otherwise an
/// OS-assigned ephemeral port.
///
/// The temporary listener is released before returning, so another process may
/// grab the port before the real consumer binds it.
pub async fn allocate(preferred: u16) -> Result<u16> {
    match try_bind(preferred).await {
        Ok(port) => {
            debug!(port, "preferred port is free");
            return Ok(port);
        }
        Err(err) => {
            warn!(port = preferred, error = %err, "preferred port unavailable; trying an ephemeral port");
        }
    }

    try_bind(0)
        .await
        .map_err(|source| DevloopError::PortExhaustion { preferred, source })
}

async fn try_bind(port: u16) -> std::io::Result<u16> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll until nothing accepts connections on `port`, for at most `limit`.
///
/// Returns true as soon as a connection attempt fails, false if something
/// was still listening when `limit` ran out.
pub async fn wait_until_free(port: u16, limit: Duration, poll: Duration) -> bool {
    let target = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let deadline = Instant::now() + limit;
    let mut ticks = interval_at(Instant::now() + poll, poll);

    loop {
        ticks.tick().await;
        if Instant::now() > deadline {
            return false;
        }

        let attempt = timeout(poll, TcpStream::connect(target)).await;
        match attempt {
            Ok(Ok(_stream)) => debug!(port, "port still accepting connections"),
            // Refused, or no answer within one poll period.
            Ok(Err(_)) | Err(_) => return true,
        }
    }
}
