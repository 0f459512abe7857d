// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Parent/child IPC protocol.
//!
//! Messages are line-delimited JSON. The child emits control lines on
//! stdout behind the [`IPC_PREFIX`] sentinel — everything else on stdout
//! is application output and is forwarded verbatim. The parent writes
//! plain JSON lines to the child's stdin.
//!
//! Protocol:
//! - `ready` (child → parent): sent once when the server binds, carries
//!   the bound address. Only the first one counts.
//! - `ping` / `pong` (child → parent → child): liveness probe; the
//!   parent's only obligation is to echo the value back.
//! - `client_update` (parent → child): a client-only rebuild finished;
//!   the child notifies its connected browsers instead of restarting.

use serde::{Deserialize, Serialize};

/// Sentinel prefix marking a control line on the child's stdout.
pub const IPC_PREFIX: &str = "@presto:";

/// A structured message between the parent and the child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcMessage {
    /// The child's server is bound and accepting connections.
    Ready {
        /// The address the child bound to.
        address: String,
    },
    /// Liveness probe from the child.
    Ping {
        /// Opaque payload echoed back in the pong.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
    },
    /// Echo of a ping.
    Pong {
        /// The ping's payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
    },
    /// A client-only rebuild completed.
    ClientUpdate,
}

/// Parses a child stdout line; `None` for ordinary application output
/// (including malformed control lines, which are passed through rather
/// than dropped).
pub fn parse_line(line: &str) -> Option<IpcMessage> {
    let payload = line.strip_prefix(IPC_PREFIX)?;
    serde_json::from_str(payload.trim()).ok()
}

/// Encodes a message as one JSON line (newline included).
pub fn encode(message: &IpcMessage) -> String {
    let mut line = serde_json::to_string(message).unwrap_or_default();
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ready_line() {
        let msg = parse_line(r#"@presto:{"type":"ready","address":"127.0.0.1:3000"}"#);
        assert_eq!(
            msg,
            Some(IpcMessage::Ready {
                address: "127.0.0.1:3000".to_string()
            })
        );
    }

    #[test]
    fn test_parse_ping_without_value() {
        let msg = parse_line(r#"@presto:{"type":"ping"}"#);
        assert_eq!(msg, Some(IpcMessage::Ping { value: None }));
    }

    #[test]
    fn test_ordinary_output_is_not_a_message() {
        assert_eq!(parse_line("server listening on 3000"), None);
        assert_eq!(parse_line("@presto:not json"), None);
    }

    #[test]
    fn test_encode_client_update() {
        assert_eq!(
            encode(&IpcMessage::ClientUpdate),
            "{\"type\":\"client_update\"}\n"
        );
    }

    #[test]
    fn test_encode_pong_echoes_value() {
        let pong = IpcMessage::Pong {
            value: Some(serde_json::json!(42)),
        };
        assert_eq!(encode(&pong), "{\"type\":\"pong\",\"value\":42}\n");
    }
}
