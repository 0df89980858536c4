//! AWS request signing (Signature Version 4)
//!
//! Every service client sends its requests through [`AwsAuth`], which adds
//! the date, session token and `Authorization` headers.

use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use ring::hmac;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

use crate::config::AwsConfig;
use crate::error::{Error, Result};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static credentials for signing
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    /// Create credentials from explicit values
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::Config("AWS_ACCESS_KEY_ID is not set".to_string()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::Config("AWS_SECRET_ACCESS_KEY is not set".to_string()))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self::new(access_key_id, secret_access_key, session_token))
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One outgoing service call, before signing
#[derive(Debug)]
pub struct ServiceRequest<'a> {
    /// Signing name of the service (`bedrock`, `textract`, `s3`, ...)
    pub service: &'a str,
    /// Operation name, used in error messages and logs
    pub operation: &'a str,
    pub method: Method,
    pub url: String,
    /// Extra headers that are sent and signed
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl<'a> ServiceRequest<'a> {
    /// Request without a body
    pub fn new(service: &'a str, operation: &'a str, method: Method, url: String) -> Self {
        Self {
            service,
            operation,
            method,
            url,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Request with a JSON body
    pub fn json(
        service: &'a str,
        operation: &'a str,
        method: Method,
        url: String,
        body: &impl Serialize,
    ) -> Result<Self> {
        Ok(Self::new(service, operation, method, url)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_vec(body)?))
    }

    /// JSON-RPC style request (`X-Amz-Target` dispatch), as Textract and DynamoDB use
    pub fn target(
        service: &'a str,
        operation: &'a str,
        url: String,
        target: &str,
        content_type: &str,
        body: &impl Serialize,
    ) -> Result<Self> {
        Ok(Self::new(service, operation, Method::POST, url)
            .with_header("content-type", content_type)
            .with_header("x-amz-target", target)
            .with_body(serde_json::to_vec(body)?))
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// Request parts covered by the signature
pub struct SigningRequest<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub url: &'a Url,
    /// Lowercase header names
    pub headers: &'a [(String, String)],
    pub payload: &'a [u8],
}

/// AWS authentication and signed transport
pub struct AwsAuth {
    credentials: Credentials,
    region: String,
    endpoint_url: Option<String>,
    http: reqwest::Client,
}

impl AwsAuth {
    /// Create with explicit credentials
    pub fn new(credentials: Credentials, config: &AwsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            region: config.region.clone(),
            endpoint_url: config
                .endpoint_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            http,
        })
    }

    /// Create from the standard credential environment variables
    pub fn from_env(config: &AwsConfig) -> Result<Self> {
        Self::new(Credentials::from_env()?, config)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Base URL for a service host prefix (e.g. `bedrock-runtime`)
    pub fn endpoint(&self, host_prefix: &str) -> String {
        match &self.endpoint_url {
            Some(url) => url.clone(),
            None => format!("https://{}.{}.amazonaws.com", host_prefix, self.region),
        }
    }

    /// Whether requests go to a custom endpoint instead of the public hosts
    pub fn has_endpoint_override(&self) -> bool {
        self.endpoint_url.is_some()
    }

    /// Compute the headers that authenticate a request at `now`
    pub fn sign(&self, request: &SigningRequest<'_>, now: DateTime<Utc>) -> Vec<(String, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(request.payload));
        let is_s3 = request.service == "s3";

        let mut added = vec![("x-amz-date".to_string(), amz_date.clone())];
        if is_s3 {
            added.push(("x-amz-content-sha256".to_string(), payload_hash.clone()));
        }
        if let Some(token) = &self.credentials.session_token {
            added.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let mut canonical: Vec<(String, String)> = request
            .headers
            .iter()
            .chain(added.iter())
            .map(|(name, value)| (name.to_ascii_lowercase(), normalize_header_value(value)))
            .collect();
        canonical.push(("host".to_string(), host_header(request.url)));
        canonical.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_headers: String = canonical
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();
        let signed_headers = canonical
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method,
            canonical_uri(request.url, is_s3),
            canonical_query(request.url),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, request.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(
            &self.credentials.secret_access_key,
            &date,
            &self.region,
            request.service,
        );
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        added.push((
            "authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
            ),
        ));
        added
    }

    /// Sign and send a request
    pub async fn send(&self, request: ServiceRequest<'_>) -> Result<reqwest::Response> {
        let url = Url::parse(&request.url)
            .map_err(|e| Error::Config(format!("Invalid endpoint URL {}: {}", request.url, e)))?;

        let signed = self.sign(
            &SigningRequest {
                service: request.service,
                method: request.method.as_str(),
                url: &url,
                headers: &request.headers,
                payload: &request.body,
            },
            Utc::now(),
        );

        tracing::debug!("{} {} {}", request.operation, request.method, url);

        let mut builder = self.http.request(request.method, url);
        for (name, value) in request.headers.iter().chain(signed.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        Ok(builder.body(request.body).send().await?)
    }

    /// Send, check the status, and decode a JSON response; every failure is
    /// wrapped by `wrap` into the caller's error kind
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: ServiceRequest<'_>,
        wrap: impl Fn(String) -> Error,
    ) -> Result<T> {
        let operation = request.operation;
        let response = self
            .send(request)
            .await
            .map_err(|e| wrap(format!("{} request failed: {}", operation, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(wrap(format!(
                "{} failed ({}): {}",
                operation,
                status,
                service_error_message(&body)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| wrap(format!("Failed to parse {} response: {}", operation, e)))
    }
}

/// Pull the human-readable message out of an AWS error body
pub fn service_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(alias = "Message")]
        message: Option<String>,
        #[serde(rename = "__type")]
        error_type: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            error_type: Some(error_type),
        }) => {
            let short = error_type.rsplit('#').next().unwrap_or(&error_type);
            format!("{}: {}", short, message)
        }
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => body.trim().to_string(),
    }
}

/// Percent-encode per RFC 3986 unreserved characters
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// S3 signs the path as sent; every other service signs each segment encoded again
fn canonical_uri(url: &Url, is_s3: bool) -> String {
    let path = url.path();
    if path.is_empty() {
        return "/".to_string();
    }
    if is_s3 {
        return path.to_string();
    }
    path.split('/')
        .map(|segment| uri_encode(segment, true))
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k, true), uri_encode(&v, true)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_auth(session_token: Option<String>) -> AwsAuth {
        AwsAuth::new(
            Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
                session_token,
            ),
            &AwsConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_get_vanilla_signature() {
        // AWS SigV4 test suite: get-vanilla
        let auth = example_auth(None);
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let headers = auth.sign(
            &SigningRequest {
                service: "service",
                method: "GET",
                url: &url,
                headers: &[],
                payload: b"",
            },
            now,
        );

        let authorization = headers
            .iter()
            .find(|(name, _)| name == "authorization")
            .map(|(_, value)| value.as_str())
            .unwrap();
        assert_eq!(
            authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert!(headers.iter().any(|(n, v)| n == "x-amz-date" && v == "20150830T123600Z"));
    }

    #[test]
    fn test_session_token_and_s3_payload_hash_are_signed() {
        let auth = example_auth(Some("token".to_string()));
        let url = Url::parse("https://bucket.s3.us-east-1.amazonaws.com/a%20b.txt").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let headers = auth.sign(
            &SigningRequest {
                service: "s3",
                method: "GET",
                url: &url,
                headers: &[],
                payload: b"",
            },
            now,
        );

        let names: Vec<&str> = headers.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"x-amz-security-token"));
        assert!(names.contains(&"x-amz-content-sha256"));
        let authorization = &headers.last().unwrap().1;
        assert!(authorization.contains(
            "SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token"
        ));
    }

    #[test]
    fn test_canonical_uri_double_encodes_outside_s3() {
        let url = Url::parse(
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-v2%3A1/invoke",
        )
        .unwrap();
        assert_eq!(
            canonical_uri(&url, false),
            "/model/anthropic.claude-v2%253A1/invoke"
        );
        assert_eq!(canonical_uri(&url, true), "/model/anthropic.claude-v2%3A1/invoke");
    }

    #[test]
    fn test_canonical_query_sorted_and_encoded() {
        let url = Url::parse("https://example.com/?b=2&a=x%20y").unwrap();
        assert_eq!(canonical_query(&url), "a=x%20y&b=2");
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("a b/c:d", true), "a%20b%2Fc%3Ad");
        assert_eq!(uri_encode("audio/doc 1.mp3", false), "audio/doc%201.mp3");
    }

    #[test]
    fn test_service_error_message() {
        let body = r#"{"__type":"com.amazon.coral#ValidationException","message":"bad id"}"#;
        assert_eq!(service_error_message(body), "ValidationException: bad id");
        assert_eq!(service_error_message(r#"{"Message":"denied"}"#), "denied");
        assert_eq!(service_error_message("<xml/>"), "<xml/>");
    }

    #[test]
    fn test_endpoint_override() {
        let config = AwsConfig {
            endpoint_url: Some("http://localhost:4566/".to_string()),
            ..Default::default()
        };
        let auth = AwsAuth::new(Credentials::new("a", "b", None), &config).unwrap();
        assert_eq!(auth.endpoint("textract"), "http://localhost:4566");

        let auth = example_auth(None);
        assert_eq!(
            auth.endpoint("bedrock-runtime"),
            "https://bedrock-runtime.us-east-1.amazonaws.com"
        );
    }
}
