//! Control channel protocol
//!
//! JSON text frames tagged by `type`:
//! - client -> server: `{ type: "input", data }`, `{ type: "resize", cols, rows }`
//! - server -> client: `{ type: "output", data, encoding }`
//!
//! Output carries raw process bytes. With `encoding: "base64"` the bytes survive
//! the JSON string intact; `"text"` is the lossy UTF-8 form older clients expect.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::viewport::Geometry;

/// Protocol errors. Receivers drop offending frames silently.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid geometry {cols}x{rows}")]
    InvalidGeometry { cols: u16, rows: u16 },

    #[error("Invalid base64 output: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

impl ClientMessage {
    pub fn resize(geometry: Geometry) -> Self {
        ClientMessage::Resize {
            cols: geometry.cols,
            rows: geometry.rows,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Encoding of the `data` field of an output message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEncoding {
    #[default]
    Base64,
    Text,
}

impl OutputEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "base64" => Some(OutputEncoding::Base64),
            "text" | "utf8" | "utf-8" => Some(OutputEncoding::Text),
            _ => None,
        }
    }
}

// Frames without an `encoding` field come from text-only servers
fn legacy_encoding() -> OutputEncoding {
    OutputEncoding::Text
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Output {
        data: String,
        #[serde(default = "legacy_encoding")]
        encoding: OutputEncoding,
    },
}

impl ServerMessage {
    /// Wrap one chunk of process output
    pub fn output(chunk: &[u8], encoding: OutputEncoding) -> Self {
        let data = match encoding {
            OutputEncoding::Base64 => BASE64.encode(chunk),
            OutputEncoding::Text => String::from_utf8_lossy(chunk).into_owned(),
        };
        ServerMessage::Output { data, encoding }
    }

    /// Raw bytes carried by an output message
    pub fn decode_output(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ServerMessage::Output {
                data,
                encoding: OutputEncoding::Base64,
            } => Ok(BASE64.decode(data)?),
            ServerMessage::Output {
                data,
                encoding: OutputEncoding::Text,
            } => Ok(data.clone().into_bytes()),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a client frame. Resize requests must be strictly positive.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let msg: ClientMessage = serde_json::from_str(text)?;
    if let ClientMessage::Resize { cols, rows } = msg {
        if cols == 0 || rows == 0 {
            return Err(ProtocolError::InvalidGeometry { cols, rows });
        }
    }
    Ok(msg)
}

/// Parse a server frame
pub fn parse_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        let msg = parse_client_message(r#"{"type":"input","data":"ls\r"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input {
                data: "ls\r".to_string()
            }
        );
    }

    #[test]
    fn test_parse_resize() {
        let msg = parse_client_message(r#"{"type":"resize","cols":100,"rows":25}"#).unwrap();
        assert_eq!(msg, ClientMessage::Resize { cols: 100, rows: 25 });
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_client_message("not json").is_err());
        assert!(parse_client_message(r#"{"type":"input"}"#).is_err());
        assert!(parse_client_message(r#"{"type":"bogus","data":"x"}"#).is_err());
        assert!(parse_client_message(r#"{"data":"x"}"#).is_err());
        assert!(parse_client_message(r#"{"type":"resize","cols":"80","rows":24}"#).is_err());
        assert!(parse_client_message(r#"{"type":"resize","cols":-1,"rows":24}"#).is_err());
        assert!(parse_client_message(r#"{"type":"resize","cols":70000,"rows":24}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_zero_geometry() {
        let err = parse_client_message(r#"{"type":"resize","cols":0,"rows":24}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidGeometry { cols: 0, rows: 24 }));
    }

    #[test]
    fn test_client_message_json_shape() {
        let json = ClientMessage::Input {
            data: "\x03".to_string(),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"input","data":"\u0003"}"#);

        let json = ClientMessage::resize(Geometry::new(120, 40)).to_json().unwrap();
        assert_eq!(json, r#"{"type":"resize","cols":120,"rows":40}"#);
    }

    #[test]
    fn test_output_base64_preserves_split_utf8() {
        // "é" is 0xC3 0xA9; a chunk boundary can land between the two bytes
        let first = ServerMessage::output(&[b'a', 0xc3], OutputEncoding::Base64);
        let second = ServerMessage::output(&[0xa9, b'b'], OutputEncoding::Base64);

        let mut joined = first.decode_output().unwrap();
        joined.extend(second.decode_output().unwrap());
        assert_eq!(String::from_utf8(joined).unwrap(), "aéb");
    }

    #[test]
    fn test_output_text_encoding_is_lossy() {
        let msg = ServerMessage::output(&[b'a', 0xc3], OutputEncoding::Text);
        assert_eq!(msg.decode_output().unwrap(), "a\u{fffd}".as_bytes());
    }

    #[test]
    fn test_output_json_shape() {
        let json = ServerMessage::output(b"hi", OutputEncoding::Base64).to_json().unwrap();
        assert_eq!(json, r#"{"type":"output","data":"aGk=","encoding":"base64"}"#);
    }

    #[test]
    fn test_legacy_output_without_encoding() {
        let msg = parse_server_message(r#"{"type":"output","data":"$ "}"#).unwrap();
        assert_eq!(msg.decode_output().unwrap(), b"$ ");
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(OutputEncoding::from_name("BASE64"), Some(OutputEncoding::Base64));
        assert_eq!(OutputEncoding::from_name("utf8"), Some(OutputEncoding::Text));
        assert_eq!(OutputEncoding::from_name("gzip"), None);
    }
}
