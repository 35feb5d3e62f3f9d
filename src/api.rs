// API client module: a small blocking client for the Azure Blob REST API.
// It covers the handful of calls the console needs and nothing more:
// container exists/create/list and blob list/upload/download/delete.
//
// Requests are authorised with the account key (Shared Key) or with a SAS
// token, whichever the connection string provides.

use crate::error::{Result, StoreError};
use crate::store::BlobStore;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use sha2::Sha256;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, instrument};

/// Azure REST API version sent with every request.
pub const API_VERSION: &str = "2023-11-03";

/// Well-known Azurite account used by `UseDevelopmentStorage=true`.
const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Encode everything except unreserved characters and '/'.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Query values additionally keep '/' encoded.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Clone)]
enum Auth {
    SharedKey { key: Vec<u8> },
    Sas { token: String },
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::SharedKey { .. } => f.write_str("SharedKey(..)"),
            Auth::Sas { .. } => f.write_str("Sas(..)"),
        }
    }
}

/// The parts of a storage connection string the client needs.
#[derive(Debug, Clone)]
pub struct ConnectionString {
    pub account_name: String,
    /// Blob service base URL, without trailing slash.
    pub blob_endpoint: String,
    auth: Auth,
}

impl ConnectionString {
    /// Parse a `Key=Value;Key=Value` connection string.
    ///
    /// Values may themselves contain `=` (account keys and SAS tokens do),
    /// so each pair is split on the first `=` only.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut protocol = "https".to_string();
        let mut account_name = None;
        let mut account_key = None;
        let mut endpoint_suffix = "core.windows.net".to_string();
        let mut blob_endpoint = None;
        let mut sas = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                StoreError::InvalidConnectionString(format!("\"{part}\" is not a Key=Value pair"))
            })?;
            match key {
                "UseDevelopmentStorage" if value.eq_ignore_ascii_case("true") => {
                    return Ok(Self::development());
                }
                "DefaultEndpointsProtocol" => protocol = value.to_string(),
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "EndpointSuffix" => endpoint_suffix = value.to_string(),
                "BlobEndpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                "SharedAccessSignature" => sas = Some(value.trim_start_matches('?').to_string()),
                _ => {}
            }
        }

        let auth = match (account_key, sas) {
            (Some(key), _) => Auth::SharedKey {
                key: BASE64_STANDARD.decode(key).map_err(|e| {
                    StoreError::InvalidConnectionString(format!(
                        "AccountKey is not valid base64: {e}"
                    ))
                })?,
            },
            (None, Some(token)) => Auth::Sas { token },
            (None, None) => {
                return Err(StoreError::InvalidConnectionString(
                    "neither AccountKey nor SharedAccessSignature is present".into(),
                ))
            }
        };

        let account_name = match (account_name, &blob_endpoint) {
            (Some(name), _) => name,
            // SAS-only strings may omit AccountName; take it from the host.
            (None, Some(endpoint)) => account_from_endpoint(endpoint).ok_or_else(|| {
                StoreError::InvalidConnectionString("AccountName is missing".into())
            })?,
            (None, None) => {
                return Err(StoreError::InvalidConnectionString(
                    "AccountName is missing".into(),
                ))
            }
        };

        let blob_endpoint = blob_endpoint
            .unwrap_or_else(|| format!("{protocol}://{account_name}.blob.{endpoint_suffix}"));

        Ok(ConnectionString {
            account_name,
            blob_endpoint,
            auth,
        })
    }

    fn development() -> Self {
        ConnectionString {
            account_name: DEV_ACCOUNT.into(),
            blob_endpoint: DEV_BLOB_ENDPOINT.into(),
            auth: Auth::SharedKey {
                // Constant is valid base64.
                key: BASE64_STANDARD.decode(DEV_ACCOUNT_KEY).unwrap_or_default(),
            },
        }
    }

    pub fn uses_sas(&self) -> bool {
        matches!(self.auth, Auth::Sas { .. })
    }
}

fn account_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint.split("://").nth(1)?.split('/').next()?;
    host.split('.').next().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Blocking Azure Blob client. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AzureClient {
    client: Client,
    account: String,
    endpoint: String,
    /// Path component of the endpoint ("" for the public cloud,
    /// "/devstoreaccount1" for Azurite), needed when signing.
    endpoint_path: String,
    auth: Auth,
}

/// A request about to be signed and sent.
struct Call<'a> {
    operation: &'static str,
    method: Method,
    /// Path below the endpoint, already percent-encoded, starting with '/'.
    path: String,
    query: Vec<(&'a str, String)>,
    ms_headers: Vec<(&'a str, String)>,
    content_type: &'a str,
    body: Option<(Body, u64)>,
}

impl<'a> Call<'a> {
    fn new(operation: &'static str, method: Method, path: String) -> Self {
        Call {
            operation,
            method,
            path,
            query: Vec::new(),
            ms_headers: Vec::new(),
            content_type: "",
            body: None,
        }
    }

    fn query(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

impl AzureClient {
    /// Build a client from a connection string. No request is made yet.
    pub fn from_connection_string(raw: &str) -> Result<Self> {
        let conn = ConnectionString::parse(raw)?;
        let client = Client::builder().build().map_err(|source| StoreError::Transport {
            operation: "build client",
            source,
        })?;
        let endpoint_path = conn
            .blob_endpoint
            .split("://")
            .nth(1)
            .and_then(|rest| rest.find('/').map(|i| rest[i..].to_string()))
            .unwrap_or_default();
        debug!(
            account = %conn.account_name,
            endpoint = %conn.blob_endpoint,
            "Azure client configured"
        );
        Ok(AzureClient {
            client,
            account: conn.account_name,
            endpoint: conn.blob_endpoint,
            endpoint_path,
            auth: conn.auth,
        })
    }

    fn container_path(container: &str) -> String {
        format!("/{}", utf8_percent_encode(container, PATH_ENCODE_SET))
    }

    fn blob_path(container: &str, blob: &str) -> String {
        format!(
            "/{}/{}",
            utf8_percent_encode(container, PATH_ENCODE_SET),
            utf8_percent_encode(blob, PATH_ENCODE_SET)
        )
    }

    fn send(&self, call: Call<'_>) -> Result<Response> {
        let date = httpdate::fmt_http_date(SystemTime::now());

        let mut url = format!("{}{}", self.endpoint, call.path);
        let mut pairs: Vec<String> = call
            .query
            .iter()
            .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, QUERY_ENCODE_SET)))
            .collect();
        if let Auth::Sas { token } = &self.auth {
            pairs.push(token.clone());
        }
        if !pairs.is_empty() {
            url.push('?');
            url.push_str(&pairs.join("&"));
        }

        let mut ms_headers: Vec<(String, String)> = vec![
            ("x-ms-date".into(), date),
            ("x-ms-version".into(), API_VERSION.into()),
        ];
        ms_headers.extend(call.ms_headers.iter().map(|(k, v)| (k.to_lowercase(), v.clone())));

        let mut req: RequestBuilder = self.client.request(call.method.clone(), &url);
        for (k, v) in &ms_headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if !call.content_type.is_empty() {
            req = req.header("Content-Type", call.content_type);
        }

        let content_length = call.body.as_ref().map(|(_, len)| *len);
        if let Auth::SharedKey { key } = &self.auth {
            let resource = canonicalized_resource(
                &self.account,
                &format!("{}{}", self.endpoint_path, call.path),
                &call.query,
            );
            let to_sign = string_to_sign(
                call.method.as_str(),
                content_length,
                call.content_type,
                &ms_headers,
                &resource,
            );
            let signature = sign(key, &to_sign)?;
            req = req.header("Authorization", format!("SharedKey {}:{}", self.account, signature));
        }

        match call.body {
            Some((body, _)) => req = req.body(body),
            None if call.method == Method::PUT => req = req.header("Content-Length", "0"),
            None => {}
        }

        debug!(operation = call.operation, %url, "sending request");
        req.send().map_err(|source| StoreError::Transport {
            operation: call.operation,
            source,
        })
    }

    fn http_error(operation: &'static str, resp: Response) -> StoreError {
        let status = resp.status().as_u16();
        let body = resp.text().unwrap_or_default();
        StoreError::Http {
            operation,
            status,
            body,
        }
    }

    /// Follow `NextMarker` pagination for a listing call and collect the
    /// `<Name>` of every `element`.
    fn list_all(
        &self,
        operation: &'static str,
        path: String,
        scoped: bool,
        element: &str,
    ) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut call = Call::new(operation, Method::GET, path.clone());
            if scoped {
                call = call.query("restype", "container");
            }
            call = call.query("comp", "list");
            if let Some(m) = &marker {
                call = call.query("marker", m.clone());
            }
            let resp = self.send(call)?;
            if !resp.status().is_success() {
                return Err(Self::http_error(operation, resp));
            }
            let body = resp
                .text()
                .map_err(|source| StoreError::Transport { operation, source })?;
            let (mut page, next) = parse_listing(&body, element);
            names.append(&mut page);
            match next {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        Ok(names)
    }
}

impl BlobStore for AzureClient {
    fn account_name(&self) -> &str {
        &self.account
    }

    #[instrument(skip(self), level = "debug")]
    fn container_exists(&self, container: &str) -> Result<bool> {
        let call = Call::new("container exists", Method::GET, Self::container_path(container))
            .query("restype", "container");
        let resp = self.send(call)?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::http_error("container exists", resp)),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn create_container(&self, container: &str) -> Result<()> {
        let call = Call::new("create container", Method::PUT, Self::container_path(container))
            .query("restype", "container");
        let resp = self.send(call)?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT | StatusCode::BAD_REQUEST => {
                let body = resp.text().unwrap_or_default();
                Err(StoreError::CreationRejected {
                    name: container.to_string(),
                    reason: error_code(&body).unwrap_or(body),
                })
            }
            _ => Err(Self::http_error("create container", resp)),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn list_containers(&self) -> Result<Vec<String>> {
        self.list_all("list containers", "/".into(), false, "Container")
    }

    #[instrument(skip(self), level = "debug")]
    fn list_blobs(&self, container: &str) -> Result<Vec<String>> {
        self.list_all("list blobs", Self::container_path(container), true, "Blob")
    }

    #[instrument(skip(self), level = "debug")]
    fn upload_blob(&self, container: &str, blob: &str, source: &Path) -> Result<()> {
        let file = File::open(source)?;
        let len = file.metadata()?.len();
        let mut call = Call::new("upload", Method::PUT, Self::blob_path(container, blob));
        call.ms_headers.push(("x-ms-blob-type", "BlockBlob".into()));
        call.content_type = "application/octet-stream";
        call.body = Some((Body::sized(file, len), len));

        let resp = self.send(call)?;
        if !resp.status().is_success() {
            return Err(Self::http_error("upload", resp));
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn download_blob(&self, container: &str, blob: &str, dest: &Path) -> Result<()> {
        let call = Call::new("download", Method::GET, Self::blob_path(container, blob));
        let mut resp = self.send(call)?;
        match resp.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(StoreError::NotFound {
                    kind: "blob",
                    name: blob.to_string(),
                })
            }
            _ => return Err(Self::http_error("download", resp)),
        }

        let mut file = OpenOptions::new().write(true).create_new(true).open(dest)?;
        if let Err(source) = resp.copy_to(&mut file) {
            drop(file);
            // Leave no truncated file behind.
            let _ = std::fs::remove_file(dest);
            return Err(StoreError::Transport {
                operation: "download",
                source,
            });
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        let call = Call::new("delete", Method::DELETE, Self::blob_path(container, blob));
        let resp = self.send(call)?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                kind: "blob",
                name: blob.to_string(),
            }),
            _ => Err(Self::http_error("delete", resp)),
        }
    }
}

/// `/{account}{path}` followed by one `\nkey:value` line per query
/// parameter, sorted by key.
fn canonicalized_resource(account: &str, path: &str, query: &[(&str, String)]) -> String {
    let mut resource = format!("/{account}{path}");
    let mut sorted: Vec<(String, &String)> =
        query.iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    for (k, v) in sorted {
        resource.push_str(&format!("\n{k}:{v}"));
    }
    resource
}

/// Shared Key string-to-sign. Date is carried in `x-ms-date`, so the
/// standard Date line stays empty.
fn string_to_sign(
    method: &str,
    content_length: Option<u64>,
    content_type: &str,
    ms_headers: &[(String, String)],
    resource: &str,
) -> String {
    let content_length = match content_length {
        Some(0) | None => String::new(),
        Some(len) => len.to_string(),
    };

    let mut headers: Vec<&(String, String)> = ms_headers.iter().collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonicalized_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();

    format!(
        "{method}\n\n\n{content_length}\n\n{content_type}\n\n\n\n\n\n\n{canonicalized_headers}{resource}"
    )
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| StoreError::Signing(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Pull the `<Name>` of every `<{element}>` out of an enumeration response,
/// plus the continuation marker if there is one.
fn parse_listing(body: &str, element: &str) -> (Vec<String>, Option<String>) {
    let open = format!("<{element}>");
    let close = format!("</{element}>");

    let mut names = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else { break };
        if let Some(name) = tag_text(&after[..end], "Name") {
            names.push(xml_unescape(name));
        }
        rest = &after[end + close.len()..];
    }

    let next = tag_text(body, "NextMarker")
        .filter(|m| !m.is_empty())
        .map(xml_unescape);
    (names, next)
}

fn tag_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(&xml[start..start + end])
}

fn error_code(body: &str) -> Option<String> {
    tag_text(body, "Code").map(xml_unescape)
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
