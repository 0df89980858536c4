//! Trace identifiers and the propagation header
//!
//! Header format: `Root=1-{epoch hex}-{96-bit hex};Parent={16 hex};Sampled=0|1`

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Environment variable the Lambda runtime uses to pass the header
pub const TRACE_ENV_VAR: &str = "_X_AMZN_TRACE_ID";

/// Set by the Lambda runtime in every function environment
pub const LAMBDA_FUNCTION_ENV_VAR: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// HTTP header carrying the trace context
pub const TRACE_HTTP_HEADER: &str = "x-amzn-trace-id";

/// Trace id: `1-{8 hex epoch seconds}-{24 hex random}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(String);

impl TraceId {
    /// New id stamped with the current time
    pub fn generate() -> Self {
        let epoch = Utc::now().timestamp() as u32;
        let random: [u8; 12] = rand::random();
        Self(format!("1-{:08x}-{}", epoch, hex::encode(random)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TraceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let valid = matches!(
            parts.as_slice(),
            ["1", epoch, random]
                if is_hex(epoch, 8) && is_hex(random, 24)
        );
        if !valid {
            return Err(Error::Trace(format!("Malformed trace id: {}", s)));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for TraceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Random 64-bit entity id as 16 hex characters
pub fn new_entity_id() -> String {
    let random: [u8; 8] = rand::random();
    hex::encode(random)
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parsed trace propagation header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeader {
    pub root: TraceId,
    /// Id of the calling segment, when this request is part of a larger trace
    pub parent: Option<String>,
    /// Upstream sampling decision; `None` leaves it to the recorder
    pub sampled: Option<bool>,
}

impl TraceHeader {
    /// Fresh root header for a request that arrived without one
    pub fn new_root() -> Self {
        Self {
            root: TraceId::generate(),
            parent: None,
            sampled: Some(true),
        }
    }

    /// Read the header the Lambda runtime set for the current invocation
    pub fn from_env() -> Option<Self> {
        Self::from_lambda_env(
            std::env::var(LAMBDA_FUNCTION_ENV_VAR).ok().as_deref(),
            std::env::var(TRACE_ENV_VAR).ok().as_deref(),
        )
    }

    /// Header from the runtime variables
    ///
    /// Ignored unless a function name is set: outside Lambda the variable is
    /// process-wide and would tie unrelated requests to one trace.
    pub fn from_lambda_env(function_name: Option<&str>, raw: Option<&str>) -> Option<Self> {
        function_name.filter(|name| !name.is_empty())?;
        raw?.parse().ok()
    }

    /// Whether segments for this trace should be sent
    pub fn is_sampled(&self) -> bool {
        self.sampled.unwrap_or(true)
    }
}

impl FromStr for TraceHeader {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut root = None;
        let mut parent = None;
        let mut sampled = None;

        for field in s.split(';') {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            match key.trim() {
                "Root" => root = Some(value.trim().parse::<TraceId>()?),
                "Parent" if is_hex(value.trim(), 16) => parent = Some(value.trim().to_string()),
                "Sampled" => {
                    sampled = match value.trim() {
                        "1" => Some(true),
                        "0" => Some(false),
                        _ => None,
                    }
                }
                _ => {}
            }
        }

        let root = root.ok_or_else(|| Error::Trace(format!("Trace header without Root: {}", s)))?;
        Ok(Self {
            root,
            parent,
            sampled,
        })
    }
}

impl fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Root={}", self.root)?;
        if let Some(parent) = &self.parent {
            write!(f, ";Parent={}", parent)?;
        }
        if let Some(sampled) = self.sampled {
            write!(f, ";Sampled={}", if sampled { 1 } else { 0 })?;
        }
        Ok(())
    }
}
