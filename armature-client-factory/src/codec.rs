//! Body encoders and decoders.

use serde_json::Value;

use crate::{HttpClientError, RequestTemplate, Response, Result};

/// Writes an in-memory body into the request template.
pub trait Encoder: Send + Sync {
    fn encode(&self, body: &Value, template: &mut RequestTemplate) -> Result<()>;
}

/// Reads a successful response body.
pub trait Decoder: Send + Sync {
    fn decode(&self, response: &Response) -> Result<Value>;
}

/// JSON encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, body: &Value, template: &mut RequestTemplate) -> Result<()> {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpClientError::Codec(e.to_string()))?;
        template.set_body_with_type(bytes, "application/json");
        Ok(())
    }
}

/// JSON decoder. An empty body decodes to `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, response: &Response) -> Result<Value> {
        if response.bytes().is_empty() {
            return Ok(Value::Null);
        }
        response.json()
    }
}

/// `application/x-www-form-urlencoded` encoder for flat objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormEncoder;

impl Encoder for FormEncoder {
    fn encode(&self, body: &Value, template: &mut RequestTemplate) -> Result<()> {
        let encoded =
            serde_urlencoded::to_string(body).map_err(|e| HttpClientError::Codec(e.to_string()))?;
        template.set_body_with_type(encoded, "application/x-www-form-urlencoded");
        Ok(())
    }
}

/// Plain text decoder; the body is returned as a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl Decoder for TextDecoder {
    fn decode(&self, response: &Response) -> Result<Value> {
        response.text().map(Value::String)
    }
}
