//! Stored procedure invocation
//!
//! The gateway runs a named procedure with one tenant input and one large
//! character output, and hands back the output as an owned `String`. LOB
//! handles are bound to the connection that produced them, so no
//! implementation may return before the value has been copied out.

pub mod oracle;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProcedureError;
use crate::utils::string::truncate;

pub use self::oracle::{OracleConnectionManager, OracleProcedureGateway};

/// Result alias for gateway operations.
pub type ProcedureResult<T> = std::result::Result<T, ProcedureError>;

/// Positive tenant (company) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(i64);

impl TenantId {
    /// Validate and wrap a raw identifier.
    pub fn new(id: i64) -> ProcedureResult<Self> {
        if id > 0 {
            Ok(Self(id))
        } else {
            Err(ProcedureError::InvalidTenant(id))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TenantId {
    type Error = ProcedureError;

    fn try_from(id: i64) -> ProcedureResult<Self> {
        Self::new(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully materialized value of the output parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureOutput {
    /// Non-empty payload.
    Payload(String),
    /// NULL or empty output.
    Empty,
}

impl ProcedureOutput {
    /// Wrap a value read from the output parameter.
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(t) if !t.trim().is_empty() => ProcedureOutput::Payload(t),
            _ => ProcedureOutput::Empty,
        }
    }
}

/// Executes the export procedure for one tenant.
#[async_trait]
pub trait ProcedureGateway: Send + Sync {
    /// Invoke the procedure and return its output fully read into memory
    ///
    /// # Arguments
    /// * `tenant` - Tenant bound to the input parameter
    ///
    /// # Returns
    /// * `ProcedureResult<ProcedureOutput>` - Materialized output or error
    async fn invoke(&self, tenant: TenantId) -> ProcedureResult<ProcedureOutput>;

    /// Name of the procedure, for logs.
    fn procedure(&self) -> &str;
}

/// Reject payloads that carry a procedure-reported error.
///
/// Markers are matched as substrings of the raw text. The default marker is
/// the quoted key `"erro"`, quotes included, so values such as `Ferro` in
/// ordinary records do not match.
pub fn screen_payload(output: ProcedureOutput, markers: &[String]) -> ProcedureResult<ProcedureOutput> {
    if let ProcedureOutput::Payload(text) = &output {
        if let Some(marker) = markers.iter().find(|m| text.contains(m.as_str())) {
            return Err(ProcedureError::ErrorMarker {
                marker: marker.clone(),
                excerpt: truncate(text, 200),
            });
        }
    }
    Ok(output)
}
