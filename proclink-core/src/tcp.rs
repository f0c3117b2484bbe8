//! TCP stream tuning.
//!
//! # Safety
//!
//! compio owns the socket, so options are applied through a borrowed
//! `socket2::Socket` rebuilt from the raw fd/handle and forgotten afterwards
//! so the descriptor is never closed twice.

#![allow(unsafe_code)]

use std::io;

use crate::options::SocketOptions;

/// Disable Nagle and apply keepalive from `options`.
///
/// Messages are small and latency-sensitive, so TCP_NODELAY is always set.
pub fn tune_tcp_stream(stream: &compio::net::TcpStream, options: &SocketOptions) -> io::Result<()> {
    with_socket(stream, |sock| {
        sock.set_nodelay(true)?;
        if let Some(idle) = options.tcp_keepalive {
            let keepalive = socket2::TcpKeepalive::new().with_time(idle);
            sock.set_tcp_keepalive(&keepalive)?;
        }
        Ok(())
    })
}

#[cfg(unix)]
fn with_socket<F>(stream: &compio::net::TcpStream, f: F) -> io::Result<()>
where
    F: FnOnce(&socket2::Socket) -> io::Result<()>,
{
    use std::os::unix::io::{AsRawFd, FromRawFd};
    let sock = unsafe { socket2::Socket::from_raw_fd(stream.as_raw_fd()) };
    let res = f(&sock);
    std::mem::forget(sock);
    res
}

#[cfg(windows)]
fn with_socket<F>(stream: &compio::net::TcpStream, f: F) -> io::Result<()>
where
    F: FnOnce(&socket2::Socket) -> io::Result<()>,
{
    use std::os::windows::io::{AsRawSocket, FromRawSocket};
    let sock = unsafe { socket2::Socket::from_raw_socket(stream.as_raw_socket()) };
    let res = f(&sock);
    std::mem::forget(sock);
    res
}

#[cfg(not(any(unix, windows)))]
fn with_socket<F>(_stream: &compio::net::TcpStream, _f: F) -> io::Result<()>
where
    F: FnOnce(&socket2::Socket) -> io::Result<()>,
{
    Ok(())
}
