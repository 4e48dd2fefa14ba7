//! Body codecs keyed by content type
//!
//! Each content type owns one encode/decode pair. The wire representation is
//! always text so an envelope can be embedded in JSON as-is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::envelope::{Body, ContentType};
use crate::errors::ProtocolError;

pub(crate) trait BodyCodec: Sync {
    fn encode(&self, data: Body) -> Result<String, ProtocolError>;
    fn decode(&self, wire: &str) -> Result<Body, ProtocolError>;
}

/// `application/json`: base64 of the UTF-8 JSON text
struct JsonCodec;

/// `text/plain`: the literal text
struct TextCodec;

/// `application/octet-stream`: base64 of the raw bytes
struct BinaryCodec;

/// Any other content type: base64 of the UTF-8 text form
struct FallbackCodec;

static JSON: JsonCodec = JsonCodec;
static TEXT: TextCodec = TextCodec;
static BINARY: BinaryCodec = BinaryCodec;
static FALLBACK: FallbackCodec = FallbackCodec;

pub(crate) fn codec_for(content_type: &ContentType) -> &'static dyn BodyCodec {
    match content_type {
        ContentType::Json => &JSON,
        ContentType::Text => &TEXT,
        ContentType::OctetStream => &BINARY,
        ContentType::Other(_) => &FALLBACK,
    }
}

fn decode_base64_text(wire: &str) -> Result<String, ProtocolError> {
    let bytes = STANDARD.decode(wire)?;
    Ok(String::from_utf8(bytes)?)
}

impl BodyCodec for JsonCodec {
    fn encode(&self, data: Body) -> Result<String, ProtocolError> {
        let text = match data {
            Body::Json(value) => serde_json::to_string(&value)?,
            Body::Text(text) => {
                serde_json::from_str::<serde_json::Value>(&text)?;
                text
            }
            Body::Bytes(bytes) => {
                let text = String::from_utf8(bytes)?;
                serde_json::from_str::<serde_json::Value>(&text)?;
                text
            }
        };
        Ok(STANDARD.encode(text.as_bytes()))
    }

    fn decode(&self, wire: &str) -> Result<Body, ProtocolError> {
        let text = decode_base64_text(wire)?;
        Ok(Body::Json(serde_json::from_str(&text)?))
    }
}

impl BodyCodec for TextCodec {
    fn encode(&self, data: Body) -> Result<String, ProtocolError> {
        match data {
            Body::Text(text) => Ok(text),
            Body::Bytes(bytes) => Ok(String::from_utf8(bytes)?),
            Body::Json(value) => Ok(value.to_string()),
        }
    }

    fn decode(&self, wire: &str) -> Result<Body, ProtocolError> {
        Ok(Body::Text(wire.to_string()))
    }
}

impl BodyCodec for BinaryCodec {
    fn encode(&self, data: Body) -> Result<String, ProtocolError> {
        match data {
            // text is taken as already encoded by the caller
            Body::Text(text) => Ok(text),
            Body::Bytes(bytes) => Ok(STANDARD.encode(bytes)),
            structured @ Body::Json(_) => Err(ProtocolError::UnsupportedBody {
                content_type: ContentType::OctetStream.as_str().to_string(),
                kind: structured.kind(),
            }),
        }
    }

    fn decode(&self, wire: &str) -> Result<Body, ProtocolError> {
        Ok(Body::Bytes(STANDARD.decode(wire)?))
    }
}

impl BodyCodec for FallbackCodec {
    fn encode(&self, data: Body) -> Result<String, ProtocolError> {
        let text = match data {
            Body::Text(text) => text,
            Body::Bytes(bytes) => String::from_utf8(bytes)?,
            Body::Json(value) => value.to_string(),
        };
        Ok(STANDARD.encode(text.as_bytes()))
    }

    fn decode(&self, wire: &str) -> Result<Body, ProtocolError> {
        Ok(Body::Text(decode_base64_text(wire)?))
    }
}
