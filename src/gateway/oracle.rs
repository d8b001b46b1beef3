//! Oracle implementation of [`ProcedureGateway`].
//!
//! The `oracle` driver is blocking, so every call runs on the blocking thread
//! pool. Connections come from an `r2d2` pool; the pooled guard is dropped
//! only after the CLOB output has been copied into a `String`.

use std::io::Read;
use std::time::Duration;

use ::oracle::sql_type::{Clob, Lob, OracleType};
use ::oracle::{ConnStatus, Connection};
use async_trait::async_trait;
use r2d2::{ManageConnection, Pool};
use tracing::{debug, info};

use super::{ProcedureGateway, ProcedureOutput, ProcedureResult, TenantId, screen_payload};
use crate::config::OracleConfig;
use crate::error::ProcedureError;

/// Oracle error codes reported when a call exceeds the connection call timeout.
const CALL_TIMEOUT_CODES: [&str; 3] = ["DPI-1067", "ORA-03156", "ORA-03136"];

/// R2D2 connection manager for Oracle.
#[derive(Debug)]
pub struct OracleConnectionManager {
    user: String,
    pass: String,
    conn_str: String,
    call_timeout: Option<Duration>,
}

impl OracleConnectionManager {
    pub fn new(user: &str, pass: &str, conn_str: &str) -> Self {
        Self {
            user: user.to_string(),
            pass: pass.to_string(),
            conn_str: conn_str.to_string(),
            call_timeout: None,
        }
    }

    /// Apply a round-trip timeout to every connection this manager opens.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

impl ManageConnection for OracleConnectionManager {
    type Connection = Connection;
    type Error = ::oracle::Error;

    fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let conn = Connection::connect(&self.user, &self.pass, &self.conn_str)?;
        conn.set_call_timeout(self.call_timeout)?;
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.ping()
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        !matches!(conn.status(), Ok(ConnStatus::Normal))
    }
}

/// Runs the export procedure against a pooled Oracle connection.
#[derive(Clone)]
pub struct OracleProcedureGateway {
    pool: Pool<OracleConnectionManager>,
    procedure: String,
    sql: String,
    input_parameter: String,
    output_parameter: String,
    max_payload_chars: u64,
    call_timeout: Duration,
    error_markers: Vec<String>,
}

impl OracleProcedureGateway {
    /// Create a gateway with a lazily filled connection pool
    ///
    /// No connection is opened until the first invocation.
    ///
    /// # Arguments
    /// * `config` - Oracle configuration (already validated)
    ///
    /// # Returns
    /// * `Self` - New gateway
    pub fn from_config(config: &OracleConfig) -> Self {
        let call_timeout = Duration::from_secs(config.call_timeout);
        let manager = OracleConnectionManager::new(
            &config.user,
            &config.password,
            &config.connect_string,
        )
        .with_call_timeout(call_timeout);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(0))
            .connection_timeout(Duration::from_secs(config.connect_timeout))
            .build_unchecked(manager);

        Self::with_pool(pool, config)
    }

    /// Create a gateway on top of an existing pool
    pub fn with_pool(pool: Pool<OracleConnectionManager>, config: &OracleConfig) -> Self {
        Self {
            pool,
            procedure: config.procedure.clone(),
            sql: call_statement(
                &config.procedure,
                &config.input_parameter,
                &config.output_parameter,
            ),
            input_parameter: config.input_parameter.clone(),
            output_parameter: config.output_parameter.clone(),
            max_payload_chars: config.max_payload_chars,
            call_timeout: Duration::from_secs(config.call_timeout),
            error_markers: config.error_markers.clone(),
        }
    }

    /// Blocking body of [`ProcedureGateway::invoke`].
    fn run(&self, tenant: TenantId) -> ProcedureResult<ProcedureOutput> {
        let conn = self.pool.get()?;
        debug!("Acquired Oracle connection for tenant {}", tenant);

        let text = self
            .call(&conn, tenant)
            .map_err(|e| classify_oracle_error(e, self.call_timeout))?
            .map(|mut clob| read_clob(&mut clob, self.max_payload_chars))
            .transpose()?;

        // The LOB is fully read; the connection may go back to the pool now.
        drop(conn);

        screen_payload(ProcedureOutput::from_text(text), &self.error_markers)
    }

    /// Execute the statement and fetch the output locator.
    fn call(&self, conn: &Connection, tenant: TenantId) -> ::oracle::Result<Option<Clob>> {
        let mut stmt = conn.statement(&self.sql).build()?;
        stmt.execute_named(&[
            (self.input_parameter.as_str(), &tenant.get()),
            (self.output_parameter.as_str(), &OracleType::CLOB),
        ])?;
        stmt.bind_value(self.output_parameter.as_str())
    }
}

#[async_trait]
impl ProcedureGateway for OracleProcedureGateway {
    async fn invoke(&self, tenant: TenantId) -> ProcedureResult<ProcedureOutput> {
        info!("Calling {} for tenant {}", self.procedure, tenant);

        let gateway = self.clone();
        tokio::task::spawn_blocking(move || gateway.run(tenant))
            .await
            .map_err(|e| ProcedureError::Execution(format!("procedure worker failed: {e}")))?
    }

    fn procedure(&self) -> &str {
        &self.procedure
    }
}

/// Build the anonymous PL/SQL block that calls the procedure with named binds
///
/// # Arguments
/// * `procedure` - Validated, possibly package-qualified, procedure name
/// * `input` - Name of the tenant parameter
/// * `output` - Name of the CLOB output parameter
pub fn call_statement(procedure: &str, input: &str, output: &str) -> String {
    format!("BEGIN {procedure}({input} => :{input}, {output} => :{output}); END;")
}

/// Copy a CLOB into an owned string, refusing values over `limit` characters.
fn read_clob(clob: &mut Clob, limit: u64) -> ProcedureResult<String> {
    let size = clob.size()?;
    check_payload_size(size, limit)?;

    let mut text = String::with_capacity(size as usize);
    clob.read_to_string(&mut text)
        .map_err(|e| ProcedureError::Execution(format!("failed to read output LOB: {e}")))?;
    debug!("Read {} characters from output LOB", size);
    Ok(text)
}

/// Accept outputs of at most `limit` characters.
fn check_payload_size(size: u64, limit: u64) -> ProcedureResult<()> {
    if size > limit {
        return Err(ProcedureError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

fn classify_oracle_error(err: ::oracle::Error, call_timeout: Duration) -> ProcedureError {
    let message = err.to_string();
    if is_call_timeout(&message) {
        ProcedureError::Timeout(call_timeout)
    } else {
        ProcedureError::Execution(message)
    }
}

fn is_call_timeout(message: &str) -> bool {
    CALL_TIMEOUT_CODES.iter().any(|code| message.contains(code))
}
