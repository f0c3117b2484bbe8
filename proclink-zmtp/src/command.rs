use crate::codec::ZmtpError;
use proclink_core::subscription::SubscriptionEvent;
use bytes::Bytes;

/// Parsed ZMTP command (borrowed views into the payload).
#[derive(Debug, Clone)]
pub struct ZmtpCommand<'a> {
    pub name: &'a [u8],
    /// Raw bytes after the name
    pub data: &'a [u8],
}

impl<'a> ZmtpCommand<'a> {
    pub fn is(&self, lit: &[u8]) -> bool {
        self.name == lit
    }

    /// Iterate `name / value` properties (READY metadata grammar).
    pub fn properties(&self) -> Result<Vec<(&'a [u8], &'a [u8])>, ZmtpError> {
        let b = self.data;
        let mut i = 0;
        let mut props = Vec::new();

        while i < b.len() {
            let pn_len = b[i] as usize;
            i += 1;
            if b.len() < i + pn_len {
                return Err(ZmtpError::Protocol("truncated property name"));
            }
            let pn = &b[i..i + pn_len];
            i += pn_len;

            if b.len() < i + 4 {
                return Err(ZmtpError::Protocol("truncated property length"));
            }
            let vl = u32::from_be_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]) as usize;
            i += 4;

            if b.len() < i + vl {
                return Err(ZmtpError::Protocol("truncated property value"));
            }
            props.push((pn, &b[i..i + vl]));
            i += vl;
        }

        Ok(props)
    }

    /// Look up a property, matching the name case-insensitively.
    pub fn property(&self, name: &[u8]) -> Result<Option<&'a [u8]>, ZmtpError> {
        Ok(self
            .properties()?
            .into_iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v))
    }
}

/// Parse a command frame body into name + data.
pub fn parse_command(payload: &[u8]) -> Result<ZmtpCommand<'_>, ZmtpError> {
    let (&name_len, rest) = payload
        .split_first()
        .ok_or(ZmtpError::Protocol("empty command"))?;
    let name_len = name_len as usize;

    if rest.len() < name_len {
        return Err(ZmtpError::Protocol("truncated command name"));
    }

    Ok(ZmtpCommand {
        name: &rest[..name_len],
        data: &rest[name_len..],
    })
}

/// ZMTP 3.1 SUBSCRIBE / CANCEL command as a subscription event.
///
/// Returns `None` for other commands (PING, PONG, ...), which are ignored.
pub fn subscription_command(cmd: &ZmtpCommand<'_>) -> Option<SubscriptionEvent> {
    let prefix = Bytes::copy_from_slice(cmd.data);
    if cmd.is(b"SUBSCRIBE") {
        Some(SubscriptionEvent::Subscribe(prefix))
    } else if cmd.is(b"CANCEL") {
        Some(SubscriptionEvent::Unsubscribe(prefix))
    } else {
        None
    }
}
