//! Request/response envelopes
//!
//! An envelope carries an opaque payload plus routing metadata over any
//! request/response channel. The payload is stored in its wire form (see
//! [`codec`]) and decoded on demand according to the content type.

mod codec;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::envelope::codec::codec_for;
use crate::errors::ProtocolError;
use crate::state::ResultCode;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Metadata key used to correlate a response with its request
pub const REQUEST_ID_KEY: &str = "request-id";

/// Content type of an envelope body
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ContentType {
    #[default]
    Json,
    Text,
    OctetStream,
    Other(String),
}

impl ContentType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            CONTENT_TYPE_JSON => ContentType::Json,
            CONTENT_TYPE_TEXT => ContentType::Text,
            CONTENT_TYPE_OCTET_STREAM => ContentType::OctetStream,
            other => ContentType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => CONTENT_TYPE_JSON,
            ContentType::Text => CONTENT_TYPE_TEXT,
            ContentType::OctetStream => CONTENT_TYPE_OCTET_STREAM,
            ContentType::Other(raw) => raw,
        }
    }
}

impl From<&str> for ContentType {
    fn from(raw: &str) -> Self {
        ContentType::parse(raw)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ContentType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContentType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ContentType::parse(&raw))
    }
}

/// A decoded envelope payload
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A structured JSON value
    Json(Value),
    /// Plain text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Json(_) => "structured",
            Body::Text(_) => "text",
            Body::Bytes(_) => "binary",
        }
    }

    /// Deserialize the payload into `T`, reading text and bytes as JSON
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ProtocolError> {
        let value = match self {
            Body::Json(value) => serde_json::from_value(value)?,
            Body::Text(text) => serde_json::from_str(&text)?,
            Body::Bytes(bytes) => serde_json::from_slice(&bytes)?,
        };
        Ok(value)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Bytes(bytes.to_vec())
    }
}

/// Content-type aware body handling shared by requests and responses
pub trait CarriesBody {
    fn content_type(&self) -> &ContentType;

    /// Body in its wire form
    fn raw_body(&self) -> &str;

    fn store_body(&mut self, content_type: ContentType, wire: String);

    /// Encode `data` for the given content type, or the current one when `None`
    fn set_body(
        &mut self,
        data: impl Into<Body>,
        content_type: Option<ContentType>,
    ) -> Result<(), ProtocolError>
    where
        Self: Sized,
    {
        let content_type = content_type.unwrap_or_else(|| self.content_type().clone());
        let wire = codec_for(&content_type).encode(data.into())?;
        self.store_body(content_type, wire);
        Ok(())
    }

    /// Serialize `value` as a JSON body
    fn set_json_body<T: Serialize>(&mut self, value: &T) -> Result<(), ProtocolError>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(value)?;
        self.set_body(value, Some(ContentType::Json))
    }

    /// Decode the body, `None` when it is empty
    fn get_body(&self) -> Result<Option<Body>, ProtocolError> {
        if self.raw_body().is_empty() {
            return Ok(None);
        }
        codec_for(self.content_type())
            .decode(self.raw_body())
            .map(Some)
    }

    /// Decode the body and deserialize it into `T`
    fn get_json<T: DeserializeOwned>(&self) -> Result<Option<T>, ProtocolError> {
        match self.get_body()? {
            Some(body) => body.into_json().map(Some),
            None => Ok(None),
        }
    }
}

/// A request travelling to a coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEnvelope {
    pub method: String,

    pub route: String,

    #[serde(rename = "content-type")]
    pub content_type: ContentType,

    pub body: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl Default for RequestEnvelope {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            route: String::new(),
            content_type: ContentType::Json,
            body: String::new(),
            metadata: BTreeMap::new(),
            parameters: BTreeMap::new(),
        }
    }
}

impl CarriesBody for RequestEnvelope {
    fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    fn raw_body(&self) -> &str {
        &self.body
    }

    fn store_body(&mut self, content_type: ContentType, wire: String) {
        self.content_type = content_type;
        self.body = wire;
    }
}

impl RequestEnvelope {
    pub fn new(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_body(
        mut self,
        data: impl Into<Body>,
        content_type: ContentType,
    ) -> Result<Self, ProtocolError> {
        self.set_body(data, Some(content_type))?;
        Ok(self)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.metadata.get(REQUEST_ID_KEY).map(String::as_str)
    }

    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from wire text; a document that is not a JSON object yields the default request
    pub fn from_wire(wire: &str) -> Self {
        match serde_json::from_str::<Value>(wire) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                error!("Error deserializing request envelope: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_value(value: Value) -> Self {
        let mut request = Self::default();
        let Value::Object(fields) = value else {
            error!("Request envelope is not a JSON object");
            return request;
        };

        if let Some(method) = string_field(&fields, "method") {
            request.method = method;
        }
        if let Some(route) = string_field(&fields, "route") {
            request.route = route;
        }
        if let Some(content_type) = string_field(&fields, "content-type") {
            request.content_type = ContentType::parse(&content_type);
        }
        read_body(&fields, &mut request);
        request.metadata = string_map_field(&fields, "metadata");
        request.parameters = string_map_field(&fields, "parameters");
        request
    }
}

impl<'de> Deserialize<'de> for RequestEnvelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// A coordinator's reply to a [`RequestEnvelope`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "content-type")]
    pub content_type: ContentType,

    pub body: String,

    pub state: ResultCode,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(rename = "redirectUri", skip_serializing_if = "is_blank")]
    pub redirect_uri: Option<String>,
}

impl Default for ResponseEnvelope {
    fn default() -> Self {
        Self {
            content_type: ContentType::Json,
            body: String::new(),
            state: ResultCode::OK,
            metadata: BTreeMap::new(),
            redirect_uri: None,
        }
    }
}

impl CarriesBody for ResponseEnvelope {
    fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    fn raw_body(&self) -> &str {
        &self.body
    }

    fn store_body(&mut self, content_type: ContentType, wire: String) {
        self.content_type = content_type;
        self.body = wire;
    }
}

impl ResponseEnvelope {
    /// An OK response with an empty body
    pub fn ok() -> Self {
        Self::default()
    }

    /// An OK response carrying `data` as JSON
    pub fn success(data: impl Into<Body>) -> Result<Self, ProtocolError> {
        Self::success_with(data, ContentType::Json)
    }

    pub fn success_with(
        data: impl Into<Body>,
        content_type: ContentType,
    ) -> Result<Self, ProtocolError> {
        let mut response = Self::default();
        response.set_body(data, Some(content_type))?;
        Ok(response)
    }

    /// An error response with a JSON `{"error": message}` body
    pub fn error(message: &str, state: ResultCode) -> Self {
        Self::error_with(message, state, ContentType::Json)
    }

    /// An error response; text bodies read `Error: <message>`, anything but text is JSON
    pub fn error_with(message: &str, state: ResultCode, content_type: ContentType) -> Self {
        let (content_type, body) = match content_type {
            ContentType::Text => (ContentType::Text, Body::Text(format!("Error: {}", message))),
            _ => (
                ContentType::Json,
                Body::Json(serde_json::json!({ "error": message })),
            ),
        };
        let wire = codec_for(&content_type).encode(body).unwrap_or_default();
        Self {
            content_type,
            body: wire,
            state,
            ..Default::default()
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::error(message, ResultCode::NOT_FOUND)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error(message, ResultCode::BAD_REQUEST)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.metadata.get(REQUEST_ID_KEY).map(String::as_str)
    }

    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from wire text; a document that is not a JSON object yields an
    /// empty `INTERNAL_ERROR` response
    pub fn from_wire(wire: &str) -> Self {
        match serde_json::from_str::<Value>(wire) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                error!("Error deserializing response envelope: {}", e);
                Self::malformed()
            }
        }
    }

    pub fn from_value(value: Value) -> Self {
        let Value::Object(fields) = value else {
            error!("Response envelope is not a JSON object");
            return Self::malformed();
        };

        let mut response = Self::default();
        if let Some(content_type) = string_field(&fields, "content-type") {
            response.content_type = ContentType::parse(&content_type);
        }
        read_body(&fields, &mut response);
        if let Some(state) = fields.get("state") {
            response.state = ResultCode::from_wire_value(state);
        }
        response.metadata = string_map_field(&fields, "metadata");
        response.redirect_uri =
            string_field(&fields, "redirectUri").filter(|uri| !uri.is_empty());
        response
    }

    fn malformed() -> Self {
        Self {
            state: ResultCode::INTERNAL_ERROR,
            ..Default::default()
        }
    }
}

impl<'de> Deserialize<'de> for ResponseEnvelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(other) => {
            warn!("Ignoring malformed envelope field {}: {}", name, other);
            None
        }
    }
}

fn string_map_field(fields: &Map<String, Value>, name: &str) -> BTreeMap<String, String> {
    match fields.get(name) {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(entries)) => entries
            .iter()
            .filter_map(|(key, value)| match value {
                Value::String(value) => Some((key.clone(), value.clone())),
                other => {
                    warn!("Ignoring malformed {} entry {}: {}", name, key, other);
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("Ignoring malformed envelope field {}: {}", name, other);
            BTreeMap::new()
        }
    }
}

/// A string body is taken as already wire-encoded; anything else is re-encoded as JSON
fn read_body<E: CarriesBody>(fields: &Map<String, Value>, envelope: &mut E) {
    match fields.get("body") {
        None | Some(Value::Null) => {}
        Some(Value::String(wire)) => {
            let content_type = envelope.content_type().clone();
            envelope.store_body(content_type, wire.clone());
        }
        Some(structured) => {
            if let Err(e) = envelope.set_body(structured.clone(), Some(ContentType::Json)) {
                warn!("Ignoring malformed envelope body: {}", e);
            }
        }
    }
}
