//! HTTP builtins on a shared `reqwest` client cache.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, Response, redirect};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::context::ToolSettings;
use crate::error::{CapabilityError, ToolResult};
use crate::{Args, BuiltinTool, ScriptContext};

/// One header value or several.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HeaderValues {
    /// Single value.
    One(String),
    /// Repeated header.
    Many(Vec<String>),
}

impl HeaderValues {
    fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(vs) => vs,
        };
        values.iter().map(String::as_str)
    }
}

/// Options object accepted by every HTTP builtin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpOptions {
    /// `json` (default), `text`, `bin`, or a literal MIME type.
    pub content_type: Option<String>,
    /// Same shorthands as `content_type`; defaults to it.
    pub accept: Option<String>,
    /// Extra headers. These win over every default.
    #[serde(alias = "headers", alias = "herader")]
    pub header: BTreeMap<String, HeaderValues>,
    /// Cookies sent as one `Cookie` header.
    pub cookies: BTreeMap<String, String>,
    /// Request timeout in seconds; 0 disables it.
    pub timeout: Option<u64>,
    /// Skip TLS certificate verification.
    pub ignore_https_checks: bool,
    /// Follow redirects. Defaults to the host setting.
    pub allow_redirect: Option<bool>,
}

fn mime_for(shorthand: &str) -> &str {
    match shorthand {
        "json" => "application/json",
        "text" => "text/plain",
        "bin" => "application/octet-stream",
        other => other,
    }
}

impl HttpOptions {
    /// Decode the optional options object at `idx`.
    pub fn from_args(args: &Args, idx: usize) -> ToolResult<Self> {
        Ok(args.optional(idx, "opts")?.unwrap_or_default())
    }

    fn content_mime(&self) -> &str {
        mime_for(self.content_type.as_deref().unwrap_or("json"))
    }

    fn accept_mime(&self) -> &str {
        match &self.accept {
            Some(accept) => mime_for(accept),
            None => self.content_mime(),
        }
    }

    fn timeout_or(&self, default: Duration) -> Option<Duration> {
        match self.timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None if default.is_zero() => None,
            None => Some(default),
        }
    }

    /// Headers in the order they apply: defaults, cookies, then caller headers.
    fn headers(&self, with_body: bool) -> ToolResult<HeaderMap> {
        let mut map = HeaderMap::new();
        if with_body {
            map.insert(CONTENT_TYPE, header_value(self.content_mime())?);
        }
        map.insert(ACCEPT, header_value(self.accept_mime())?);
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            map.insert(COOKIE, header_value(&cookie)?);
        }
        for (name, values) in &self.header {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CapabilityError::config(format!("invalid header name '{name}': {e}")))?;
            map.remove(&name);
            for value in values.iter() {
                map.append(name.clone(), header_value(value)?);
            }
        }
        Ok(map)
    }
}

fn header_value(value: &str) -> ToolResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| CapabilityError::config(format!("invalid header value: {e}")))
}

/// Clients keyed by `(ignore_https_checks, allow_redirect)`.
pub struct HttpClients {
    clients: DashMap<(bool, bool), Client>,
    user_agent: String,
    max_redirects: usize,
}

impl std::fmt::Debug for HttpClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClients")
            .field("cached", &self.clients.len())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl HttpClients {
    /// Empty cache; clients are built on first use.
    #[must_use]
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            clients: DashMap::new(),
            user_agent: settings.http_user_agent.clone(),
            max_redirects: settings.http_max_redirects,
        }
    }

    /// Client for one TLS/redirect combination.
    pub fn client(&self, insecure: bool, follow: bool) -> ToolResult<Client> {
        if let Some(client) = self.clients.get(&(insecure, follow)) {
            return Ok(client.clone());
        }
        let policy = if follow {
            redirect::Policy::limited(self.max_redirects)
        } else {
            redirect::Policy::none()
        };
        let client = Client::builder()
            .user_agent(self.user_agent.clone())
            .redirect(policy)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| CapabilityError::config(format!("cannot build HTTP client: {e}")))?;
        debug!(insecure, follow, "built HTTP client");
        Ok(self
            .clients
            .entry((insecure, follow))
            .or_insert(client)
            .clone())
    }
}

/// Request body as scripts supply it.
fn body_bytes(body: &Value) -> ToolResult<Vec<u8>> {
    match body {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s.clone().into_bytes()),
        Value::Array(items) if items.iter().all(Value::is_u64) => {
            serde_json::from_value(body.clone())
                .map_err(|e| CapabilityError::config(format!("body is not a byte array: {e}")))
        },
        other => serde_json::to_vec(other)
            .map_err(|e| CapabilityError::config(format!("cannot encode body: {e}"))),
    }
}

/// Parsed JSON object or array, text, or raw bytes.
fn decode_body(raw: &[u8]) -> Value {
    match std::str::from_utf8(raw) {
        Ok(text) => match serde_json::from_str::<Value>(text) {
            Ok(v @ (Value::Object(_) | Value::Array(_))) => v,
            _ => Value::String(text.to_owned()),
        },
        Err(_) => Value::Array(raw.iter().map(|b| Value::from(*b)).collect()),
    }
}

fn transport_error(e: &reqwest::Error, timeout: Option<Duration>) -> CapabilityError {
    if e.is_timeout() {
        CapabilityError::Timeout {
            seconds: timeout.map_or(0, |d| d.as_secs()),
            partial: None,
        }
    } else if e.is_builder() {
        CapabilityError::config(format!("invalid request: {e}"))
    } else {
        CapabilityError::Network(e.to_string())
    }
}

async fn into_value(response: Response, timeout: Option<Duration>) -> ToolResult<Value> {
    let status = response.status().as_u16();
    let mut headers = Map::new();
    for (name, value) in response.headers() {
        let entry = headers
            .entry(name.as_str().to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.push(Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()));
        }
    }
    let raw = response
        .bytes()
        .await
        .map_err(|e| transport_error(&e, timeout))?;
    Ok(json!({
        "status": status,
        "body": decode_body(&raw),
        "headers": headers,
    }))
}

fn prepare(
    ctx: &ScriptContext,
    method: Method,
    url: &str,
    opts: &HttpOptions,
) -> ToolResult<(RequestBuilder, Option<Duration>)> {
    let settings = ctx.settings();
    let follow = opts.allow_redirect.unwrap_or(settings.http_allow_redirect);
    let client = ctx
        .services()
        .http
        .client(opts.ignore_https_checks, follow)?;
    let timeout = opts.timeout_or(settings.http_timeout);
    let mut request = client.request(method, url);
    if let Some(t) = timeout {
        request = request.timeout(t);
    }
    Ok((request, timeout))
}

async fn send(request: RequestBuilder, timeout: Option<Duration>) -> ToolResult<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(&e, timeout))?;
    into_value(response, timeout).await
}

/// Where a method takes its body from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    /// `(url, opts?)`
    Absent,
    /// `(url, body, opts?)`
    Required,
    /// `(url, body?, opts?)`; a missing or null body sends none.
    Optional,
}

/// `httpGet/httpPost/httpPut/httpPatch/httpDelete/httpHead/httpOptions
/// -> {status, body, headers}`
#[derive(Debug, Clone)]
pub struct HttpTool {
    name: &'static str,
    method: Method,
    payload: Payload,
}

impl HttpTool {
    /// One builtin per method.
    #[must_use]
    pub fn all() -> Vec<Self> {
        [
            ("httpGet", Method::GET, Payload::Absent),
            ("httpPost", Method::POST, Payload::Required),
            ("httpPut", Method::PUT, Payload::Required),
            ("httpPatch", Method::PATCH, Payload::Required),
            ("httpDelete", Method::DELETE, Payload::Optional),
            ("httpHead", Method::HEAD, Payload::Absent),
            ("httpOptions", Method::OPTIONS, Payload::Absent),
        ]
        .into_iter()
        .map(|(name, method, payload)| Self {
            name,
            method,
            payload,
        })
        .collect()
    }

    fn body(&self, args: &Args) -> ToolResult<Option<Vec<u8>>> {
        match (self.payload, args.raw(1)) {
            (Payload::Absent, _) | (Payload::Optional, None) => Ok(None),
            (_, raw) => body_bytes(raw.unwrap_or(&Value::Null)).map(Some),
        }
    }
}

#[async_trait::async_trait]
impl BuiltinTool for HttpTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        match self.payload {
            Payload::Absent => "Sends a request and returns {status, body, headers}.",
            Payload::Required | Payload::Optional => {
                "Sends a request with a body and returns {status, body, headers}."
            },
        }
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let url = args.string(0, "url")?;
        let body = self.body(&args)?;
        let opts_at = if self.payload == Payload::Absent { 1 } else { 2 };
        let opts = HttpOptions::from_args(&args, opts_at)?;

        let (mut request, timeout) = prepare(ctx, self.method.clone(), &url, &opts)?;
        request = request.headers(opts.headers(body.is_some())?);
        if let Some(body) = body {
            request = request.body(body);
        }
        debug!(method = %self.method, url = %url, "sending request");
        send(request, timeout).await
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn file_part(path: PathBuf) -> ToolResult<Part> {
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| CapabilityError::io(&path, e))?;
    let meta = file
        .metadata()
        .await
        .map_err(|e| CapabilityError::io(&path, e))?;
    if !meta.is_file() {
        return Err(CapabilityError::config(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), meta.len())
        .file_name(name)
        .mime_str("application/octet-stream")
        .map_err(|e| CapabilityError::config(e.to_string()))
}

/// `httpPostForm(url, fields, files?, opts?)`
pub struct HttpFormTool;

#[async_trait::async_trait]
impl BuiltinTool for HttpFormTool {
    fn name(&self) -> &'static str {
        "httpPostForm"
    }

    fn description(&self) -> &'static str {
        "Posts form fields, as multipart with streamed files when any are given."
    }

    async fn execute(&self, args: Args, ctx: &ScriptContext) -> ToolResult<Value> {
        let url = args.string(0, "url")?;
        let fields: BTreeMap<String, Value> = args.optional(1, "fields")?.unwrap_or_default();
        let files: BTreeMap<String, String> = args.optional(2, "files")?.unwrap_or_default();
        let opts = HttpOptions::from_args(&args, 3)?;

        let (mut request, timeout) = prepare(ctx, Method::POST, &url, &opts)?;
        // Content-Type always comes from the form encoding.
        let mut headers = opts.headers(false)?;
        headers.remove(CONTENT_TYPE);

        if files.is_empty() {
            let pairs: Vec<(String, String)> = fields
                .iter()
                .map(|(k, v)| (k.clone(), field_text(v)))
                .collect();
            request = request.headers(headers).form(&pairs);
        } else {
            let mut form = Form::new();
            for (k, v) in &fields {
                form = form.text(k.clone(), field_text(v));
            }
            for (field, path) in files {
                let path = ctx.resolve(&path).await;
                form = form.part(field, file_part(path).await?);
            }
            request = request.headers(headers).multipart(form);
        }
        debug!(url = %url, "posting form");
        send(request, timeout).await
    }
}
