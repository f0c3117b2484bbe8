//! ZMTP 3.0 handshake (NULL mechanism), completed before any message flows.
//!
//! Both sides write their greeting and READY command without waiting, so a
//! bind-side and a connect-side peer never deadlock.

use std::time::Duration;

use crate::codec::ZmtpError;
use crate::command::parse_command;
use crate::greeting::{build_greeting, Mechanism, ZmtpGreeting, GREETING_SIZE};
use crate::utils::{build_ready, encode_command, FLAG_COMMAND, FLAG_LONG};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use proclink_core::error::{MessagingError, Result};
use proclink_core::socket_type::SocketType;
use tracing::debug;

/// READY bodies are tiny; anything bigger is a confused peer.
const MAX_READY_SIZE: usize = 1024;

/// Result of a successful handshake
#[derive(Debug)]
pub struct HandshakeResult {
    pub peer_socket_type: SocketType,
    pub peer_version: (u8, u8),
}

/// Run the handshake, bounded by `timeout` when set.
pub async fn perform_handshake_with_timeout<S>(
    stream: &mut S,
    local_socket_type: SocketType,
    timeout: Option<Duration>,
) -> Result<HandshakeResult>
where
    S: AsyncRead + AsyncWrite,
{
    match timeout {
        None => perform_handshake(stream, local_socket_type).await,
        Some(dur) => compio::time::timeout(dur, perform_handshake(stream, local_socket_type))
            .await
            .map_err(|_| MessagingError::handshake(format!("timed out after {dur:?}")))?,
    }
}

/// Exchange greetings and READY commands on `stream`.
///
/// Fails if the peer's mechanism is not NULL or its socket type cannot talk
/// to `local_socket_type`.
pub async fn perform_handshake<S>(
    stream: &mut S,
    local_socket_type: SocketType,
) -> Result<HandshakeResult>
where
    S: AsyncRead + AsyncWrite,
{
    debug!("[HANDSHAKE] Starting handshake as {}", local_socket_type);

    let BufResult(res, _) = stream.write_all(build_greeting()).await;
    res?;

    let BufResult(res, greeting_buf) = stream.read_exact([0u8; GREETING_SIZE]).await;
    res?;
    let greeting = ZmtpGreeting::parse(&greeting_buf)?;
    if greeting.mechanism != Mechanism::Null {
        return Err(MessagingError::handshake(format!(
            "unsupported security mechanism {:?}",
            greeting.mechanism
        )));
    }
    debug!(
        "[HANDSHAKE] Peer greeting ZMTP {}.{}",
        greeting.major, greeting.minor
    );

    let ready = encode_command(build_ready(local_socket_type.as_str()));
    let BufResult(res, _) = stream.write_all(ready).await;
    res?;

    let BufResult(res, header) = stream.read_exact([0u8; 2]).await;
    res?;
    let flags = header[0];
    if flags & FLAG_COMMAND == 0 {
        return Err(ZmtpError::Protocol("expected READY command, got data frame").into());
    }

    let body_len = if flags & FLAG_LONG != 0 {
        // header[1] is the first byte of the 8-byte length
        let BufResult(res, rest) = stream.read_exact([0u8; 7]).await;
        res?;
        let mut len = [0u8; 8];
        len[0] = header[1];
        len[1..].copy_from_slice(&rest);
        u64::from_be_bytes(len) as usize
    } else {
        header[1] as usize
    };

    if body_len > MAX_READY_SIZE {
        return Err(ZmtpError::Protocol("READY command too large").into());
    }

    let BufResult(res, body) = stream.read_exact(vec![0u8; body_len]).await;
    res?;

    let cmd = parse_command(&body)?;
    if !cmd.is(b"READY") {
        return Err(ZmtpError::Protocol("first command is not READY").into());
    }
    let peer_socket_type = cmd
        .property(b"Socket-Type")?
        .and_then(SocketType::from_wire)
        .ok_or_else(|| MessagingError::handshake("missing or unknown Socket-Type"))?;

    if !local_socket_type.is_compatible(peer_socket_type) {
        return Err(MessagingError::handshake(format!(
            "{local_socket_type} cannot talk to {peer_socket_type}"
        )));
    }

    debug!("[HANDSHAKE] Handshake complete, peer is {}", peer_socket_type);

    Ok(HandshakeResult {
        peer_socket_type,
        peer_version: (greeting.major, greeting.minor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use compio::net::{TcpListener, TcpStream};

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, client) = futures::join!(listener.accept(), TcpStream::connect(addr));
        (accepted.unwrap().0, client.unwrap())
    }

    #[compio::test]
    async fn test_pub_sub_handshake() {
        let (mut server, mut client) = pair().await;

        let (server_res, client_res) = futures::join!(
            perform_handshake(&mut server, SocketType::Pub),
            perform_handshake(&mut client, SocketType::Sub)
        );
        let (server_res, client_res) = (server_res.unwrap(), client_res.unwrap());

        assert_eq!(client_res.peer_socket_type, SocketType::Pub);
        assert_eq!(server_res.peer_socket_type, SocketType::Sub);
        assert_eq!(client_res.peer_version, (3, 0));
    }

    #[compio::test]
    async fn test_incompatible_peer_rejected() {
        let (mut server, mut client) = pair().await;

        let (server_res, client_res) = futures::join!(
            perform_handshake(&mut server, SocketType::Pub),
            perform_handshake(&mut client, SocketType::Pub)
        );

        assert!(matches!(client_res, Err(MessagingError::Handshake(_))));
        assert!(matches!(server_res, Err(MessagingError::Handshake(_))));
    }

    #[compio::test]
    async fn test_handshake_timeout() {
        // Peer connects but never speaks.
        let (mut server, _client) = pair().await;

        let res = perform_handshake_with_timeout(
            &mut server,
            SocketType::Pub,
            Some(Duration::from_millis(50)),
        )
        .await;
        assert!(matches!(res, Err(MessagingError::Handshake(_))));
    }
}
