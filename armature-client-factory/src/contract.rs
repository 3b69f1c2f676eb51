//! Contracts map declared operations onto request templates.

use http::Method;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::descriptor::{ClientInterfaceDescriptor, OperationDescriptor};
use crate::error::BoxError;
use crate::{HttpClientError, RequestTemplate, Result};

const PATH_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Call arguments: named template parameters plus an optional body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    params: BTreeMap<String, String>,
    body: Option<Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn body_value(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parsed, validated form of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMetadata {
    name: String,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl MethodMetadata {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a query template. Later values for the same key are kept as well.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header template, replacing a previous one with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Expand the templates with `args`.
    ///
    /// Path placeholders are mandatory. Query parameters and headers whose
    /// placeholders cannot be resolved are left out. Parameters no template
    /// consumed become a JSON object body for methods that carry one, unless
    /// an explicit body is present. Returns the template and the body still
    /// to be encoded.
    pub fn expand(&self, args: &Arguments) -> Result<(RequestTemplate, Option<Value>)> {
        let mut used = HashSet::new();

        let path = expand(&self.path, args, &mut used, |v| {
            utf8_percent_encode(v, PATH_VALUE).to_string()
        })
        .ok_or_else(|| {
            HttpClientError::RequestBuild(format!(
                "missing path argument for {} in operation {}",
                self.path, self.name
            ))
        })?;

        let mut template = RequestTemplate::new(self.method.clone(), path);

        for (key, value) in &self.query {
            if let Some(value) = expand(value, args, &mut used, str::to_string) {
                template.query_param(key.clone(), value);
            }
        }

        for (name, value) in &self.headers {
            if let Some(value) = expand(value, args, &mut used, str::to_string) {
                template.header(name, value);
            }
        }

        if let Some(body) = &self.body {
            let body = expand(body, args, &mut used, str::to_string).ok_or_else(|| {
                HttpClientError::RequestBuild(format!("missing body argument in operation {}", self.name))
            })?;
            template.set_body(body);
            return Ok((template, None));
        }

        if let Some(body) = args.body_value() {
            return Ok((template, Some(body.clone())));
        }

        let carries_body = matches!(self.method, Method::POST | Method::PUT | Method::PATCH);
        let leftovers: Map<String, Value> = args
            .params()
            .filter(|(name, _)| !used.contains(*name))
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();

        if carries_body && !leftovers.is_empty() {
            Ok((template, Some(Value::Object(leftovers))))
        } else {
            Ok((template, None))
        }
    }
}

/// Expand `{name}` placeholders. Returns `None` when a placeholder has no
/// argument.
fn expand(
    input: &str,
    args: &Arguments,
    used: &mut HashSet<String>,
    encode: impl Fn(&str) -> String,
) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        out.push_str(&rest[..start]);
        out.push_str(&encode(args.get(name)?));
        used.insert(name.to_string());
        rest = &rest[start + len + 1..];
    }

    out.push_str(rest);
    Some(out)
}

/// Strategy turning declared operations into request metadata.
pub trait Contract: Send + Sync {
    fn parse(
        &self,
        interface: &ClientInterfaceDescriptor,
        operation: &OperationDescriptor,
    ) -> std::result::Result<MethodMetadata, BoxError>;
}

/// Request-line contract: `"<METHOD> <path>[?query] [HTTP/x]"` plus
/// `"Name: value"` header templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContract;

impl DefaultContract {
    fn parse_header(header: &str, operation: &str) -> std::result::Result<(String, String), BoxError> {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("Header {:?} has no ':' on operation {}", header, operation))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("Header {:?} has no name on operation {}", header, operation).into());
        }
        Ok((name.to_string(), value.trim().to_string()))
    }
}

impl Contract for DefaultContract {
    fn parse(
        &self,
        interface: &ClientInterfaceDescriptor,
        operation: &OperationDescriptor,
    ) -> std::result::Result<MethodMetadata, BoxError> {
        let line = operation.request_line().trim();
        if line.is_empty() {
            return Err(format!("Request line is empty on operation {}", operation.name()).into());
        }

        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default();
        let method = Method::from_bytes(verb.as_bytes()).map_err(|_| {
            format!(
                "Request line didn't start with an HTTP verb on operation {}",
                operation.name()
            )
        })?;
        let uri = parts.next().unwrap_or_default();

        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        let mut metadata = MethodMetadata::new(operation.name(), method, path);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            metadata = metadata.with_query(key, value);
        }

        for header in interface.headers().iter().chain(operation.headers()) {
            let (name, value) = Self::parse_header(header, operation.name())?;
            metadata = metadata.with_header(name, value);
        }

        if let Some(body) = operation.body_template() {
            metadata = metadata.with_body(body);
        }

        Ok(metadata)
    }
}
