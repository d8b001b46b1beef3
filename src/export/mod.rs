//! Cross-store export pipeline
//!
//! The [`ExportOrchestrator`] runs one export per call, strictly in order:
//!
//! 1. **Invoking**: call the stored procedure through a [`ProcedureGateway`]
//! 2. **Parsing**: decode the payload with the [`DatasetParser`]
//! 3. **Writing**: replace the target collection through a [`DocumentStoreWriter`]
//!
//! A failure stops the run at the stage where it happened and is returned
//! unchanged. Nothing is retried. A payload that fails to parse never reaches
//! the writer, so the target collection is only at risk once writing starts.
//!
//! Runs are independent and there is no locking between them: two concurrent
//! exports into the same collection can interleave their delete and insert.
//! Callers that need ordering must serialize runs themselves.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::dataset::DatasetParser;
use crate::error::{ExportError, ProcedureError, Result};
use crate::gateway::{ProcedureGateway, ProcedureOutput, TenantId};
use crate::store::{CollectionStore, DocumentStoreWriter};
use crate::utils::time::format_duration;

/// Stage of a single export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Invoking,
    Parsing,
    Writing,
    Succeeded,
    Failed(String),
}

impl ExportState {
    /// Short lowercase name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ExportState::Idle => "idle",
            ExportState::Invoking => "invoking",
            ExportState::Parsing => "parsing",
            ExportState::Writing => "writing",
            ExportState::Succeeded => "succeeded",
            ExportState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportState::Failed(reason) => write!(f, "failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Unique id of this run, also attached to its log span
    pub run_id: Uuid,
    pub tenant_id: i64,
    /// Target collection
    pub collection: String,
    /// Records written, or records parsed for a dry run
    pub records: u64,
    /// Whether the collection was replaced
    pub written: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ExportReport {
    /// Business-facing summary line.
    pub fn message(&self) -> String {
        if self.written {
            format!(
                "Exported {} record(s) for tenant {} from Oracle into MongoDB collection '{}'",
                self.records, self.tenant_id, self.collection
            )
        } else {
            format!(
                "Dry run: tenant {} produced {} record(s); collection '{}' not modified",
                self.tenant_id, self.records, self.collection
            )
        }
    }
}

/// Composes gateway, parser and writer into one export operation.
pub struct ExportOrchestrator<G, S> {
    gateway: G,
    parser: DatasetParser,
    writer: DocumentStoreWriter<S>,
    procedure_timeout: Duration,
    cancel_token: Option<CancellationToken>,
}

impl<G, S> ExportOrchestrator<G, S>
where
    G: ProcedureGateway,
    S: CollectionStore,
{
    /// Create a new orchestrator
    ///
    /// # Arguments
    /// * `gateway` - Procedure gateway for the relational source
    /// * `parser` - Payload parser
    /// * `writer` - Writer for the target collection
    /// * `procedure_timeout` - Upper bound for the procedure call
    pub fn new(
        gateway: G,
        parser: DatasetParser,
        writer: DocumentStoreWriter<S>,
        procedure_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            parser,
            writer,
            procedure_timeout,
            cancel_token: None,
        }
    }

    /// Set cancellation token for runs of this orchestrator
    ///
    /// The token is checked before each stage. A write that has started is
    /// never interrupted.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn writer(&self) -> &DocumentStoreWriter<S> {
        &self.writer
    }

    /// Export one tenant's dataset into the target collection
    ///
    /// # Arguments
    /// * `tenant_id` - Tenant identifier, must be positive
    ///
    /// # Returns
    /// * `Result<ExportReport>` - Report with the number of records written
    pub async fn export(&self, tenant_id: i64) -> Result<ExportReport> {
        self.run(tenant_id, true).await
    }

    /// Invoke and parse without touching the target collection
    ///
    /// # Arguments
    /// * `tenant_id` - Tenant identifier, must be positive
    ///
    /// # Returns
    /// * `Result<ExportReport>` - Report with the number of records parsed
    pub async fn export_dry_run(&self, tenant_id: i64) -> Result<ExportReport> {
        self.run(tenant_id, false).await
    }

    async fn run(&self, tenant_id: i64, write: bool) -> Result<ExportReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("export", %run_id, tenant = tenant_id);

        async move {
            let started_at = Utc::now();
            let clock = Instant::now();
            let mut state = ExportState::Idle;

            info!(
                "Starting export via {} into '{}'",
                self.gateway.procedure(),
                self.writer.collection()
            );

            match self.stages(tenant_id, write, &mut state).await {
                Ok(records) => {
                    let elapsed = clock.elapsed();
                    let elapsed_ms = elapsed.as_millis() as u64;
                    info!(
                        "Export finished: {} record(s) in {}",
                        records,
                        format_duration(elapsed)
                    );
                    Ok(ExportReport {
                        run_id,
                        tenant_id,
                        collection: self.writer.collection().to_string(),
                        records,
                        written: write,
                        started_at,
                        elapsed_ms,
                    })
                }
                Err(e) => {
                    let failed_in = state.name();
                    transition(&mut state, ExportState::Failed(e.to_string()));
                    error!(
                        "Export failed while {}: {} (collection {:?})",
                        failed_in,
                        e,
                        e.target_state()
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn stages(&self, tenant_id: i64, write: bool, state: &mut ExportState) -> Result<u64> {
        let tenant = TenantId::new(tenant_id)?;

        self.check_cancelled("invoking")?;
        transition(state, ExportState::Invoking);
        let payload = self.invoke(tenant).await?;

        self.check_cancelled("parsing")?;
        transition(state, ExportState::Parsing);
        let dataset = self.parser.parse(&payload)?;
        debug!("Payload carries {} record(s) under '{}'", dataset.len(), dataset.field());
        drop(payload);

        if !write {
            transition(state, ExportState::Succeeded);
            return Ok(dataset.len() as u64);
        }

        self.check_cancelled("writing")?;
        transition(state, ExportState::Writing);
        let written = self.writer.replace_all(dataset.into_records()).await?;

        transition(state, ExportState::Succeeded);
        Ok(written)
    }

    /// Call the gateway under the procedure timeout and require a payload.
    async fn invoke(&self, tenant: TenantId) -> Result<String> {
        let output = tokio::time::timeout(self.procedure_timeout, self.gateway.invoke(tenant))
            .await
            .map_err(|_| ProcedureError::Timeout(self.procedure_timeout))??;

        match output {
            ProcedureOutput::Payload(text) => {
                debug!("Procedure returned {} bytes", text.len());
                Ok(text)
            }
            ProcedureOutput::Empty => Err(ProcedureError::NoData.into()),
        }
    }

    fn check_cancelled(&self, stage: &'static str) -> Result<()> {
        match &self.cancel_token {
            Some(token) if token.is_cancelled() => Err(ExportError::Cancelled { stage }),
            _ => Ok(()),
        }
    }
}

fn transition(state: &mut ExportState, next: ExportState) {
    debug!("{} -> {}", state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mongodb::bson::{Bson, doc};
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::error::{DatasetFormatError, StoreWriteError, TargetState};
    use crate::gateway::stub::{Script, StubGateway};
    use crate::store::memory::MemoryStore;

    const TWO_USERS: &str = r#"{"usuarios":[
        {"usuario_id":1,"nome_completo":"Ana Souza","email":"ana@oasis.com","cargo":"Analista","fuso_horario":"America/Sao_Paulo"},
        {"usuario_id":2,"nome_completo":"Bruno Lima","email":"bruno@oasis.com","cargo":"Gerente","fuso_horario":"America/Manaus"}
    ]}"#;

    fn orchestrator(gateway: StubGateway, store: MemoryStore) -> ExportOrchestrator<StubGateway, MemoryStore> {
        ExportOrchestrator::new(
            gateway,
            DatasetParser::new("usuarios"),
            DocumentStoreWriter::new(store, "usuarios"),
            Duration::from_secs(5),
        )
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed("usuarios", vec![doc! { "usuario_id": 99, "nome_completo": "Antigo" }]);
        store
    }

    fn stored(o: &ExportOrchestrator<StubGateway, MemoryStore>) -> Vec<mongodb::bson::Document> {
        o.writer().store().documents("usuarios")
    }

    fn user_ids(o: &ExportOrchestrator<StubGateway, MemoryStore>) -> Vec<i64> {
        stored(o)
            .iter()
            .map(|d| match d.get("usuario_id") {
                Some(Bson::Int32(v)) => *v as i64,
                Some(Bson::Int64(v)) => *v,
                other => panic!("unexpected usuario_id {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_export_replaces_collection_with_records() {
        let o = orchestrator(StubGateway::payload(TWO_USERS), seeded_store());

        let report = o.export(1).await.unwrap();

        assert_eq!(report.records, 2);
        assert!(report.written);
        assert_eq!(report.tenant_id, 1);
        assert_eq!(report.collection, "usuarios");
        assert_eq!(user_ids(&o), vec![1, 2]);
        assert_eq!(stored(&o)[1].get_str("email").unwrap(), "bruno@oasis.com");
        assert_eq!(o.gateway().tenants(), vec![TenantId::new(1).unwrap()]);
    }

    #[tokio::test]
    async fn test_missing_field_leaves_collection_unchanged() {
        let o = orchestrator(StubGateway::payload(r#"{"empresa":"Oasis"}"#), seeded_store());

        let err = o.export(1).await.unwrap_err();

        assert!(matches!(err, ExportError::Dataset(DatasetFormatError::MissingField(_))));
        assert_eq!(err.target_state(), TargetState::Untouched);
        assert_eq!(user_ids(&o), vec![99]);
        assert_eq!(o.writer().store().insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_array_clears_collection() {
        let o = orchestrator(StubGateway::payload(r#"{"usuarios":[]}"#), seeded_store());

        let report = assert_ok!(o.export(1).await);

        assert_eq!(report.records, 0);
        assert!(stored(&o).is_empty());
    }

    #[tokio::test]
    async fn test_procedure_failure_leaves_collection_unchanged() {
        let gateway = StubGateway::new(Script::Fail(|| {
            ProcedureError::Execution("ORA-01722: invalid number".into())
        }));
        let o = orchestrator(gateway, seeded_store());

        let err = assert_err!(o.export(42).await);

        assert!(matches!(err, ExportError::Procedure(ProcedureError::Execution(_))));
        assert_eq!(user_ids(&o), vec![99]);
    }

    #[tokio::test]
    async fn test_oversized_or_flagged_output_leaves_collection_unchanged() {
        let scripts: [fn() -> ProcedureError; 2] = [
            || ProcedureError::PayloadTooLarge {
                size: 50_001,
                limit: 50_000,
            },
            || ProcedureError::ErrorMarker {
                marker: "\"erro\"".into(),
                excerpt: r#"{"erro":"ORA-01403"}"#.into(),
            },
        ];

        for make in scripts {
            let o = orchestrator(StubGateway::new(Script::Fail(make)), seeded_store());

            let err = o.export(1).await.unwrap_err();

            assert!(matches!(err, ExportError::Procedure(_)));
            assert_eq!(err.category(), crate::error::FailureCategory::Upstream);
            assert_eq!(err.target_state(), TargetState::Untouched);
            assert_eq!(o.writer().store().insert_calls(), 0);
            assert_eq!(user_ids(&o), vec![99]);
        }
    }

    #[tokio::test]
    async fn test_no_data_is_procedure_error() {
        let gateway = StubGateway::new(Script::Return(ProcedureOutput::Empty));
        let o = orchestrator(gateway, seeded_store());

        let err = o.export(1).await.unwrap_err();

        assert!(matches!(err, ExportError::Procedure(ProcedureError::NoData)));
        assert!(err.to_string().contains("no usable data"));
        assert_eq!(user_ids(&o), vec![99]);
    }

    #[tokio::test]
    async fn test_insert_failure_leaves_collection_empty() {
        let store = seeded_store();
        store.fail_inserts();
        let o = orchestrator(StubGateway::payload(TWO_USERS), store);

        let err = o.export(1).await.unwrap_err();

        assert!(matches!(err, ExportError::Store(StoreWriteError::Insert { .. })));
        assert_eq!(err.target_state(), TargetState::Cleared);
        assert!(stored(&o).is_empty());
    }

    #[tokio::test]
    async fn test_partial_insert_reported_as_partial() {
        let store = seeded_store();
        store.fail_inserts_after(1);
        let o = orchestrator(StubGateway::payload(TWO_USERS), store);

        let err = o.export(1).await.unwrap_err();

        assert!(matches!(
            err,
            ExportError::Store(StoreWriteError::Insert { inserted: Some(1), .. })
        ));
        assert_eq!(err.target_state(), TargetState::Partial);
        assert_eq!(user_ids(&o), vec![1]);
    }

    #[tokio::test]
    async fn test_repeated_export_is_idempotent() {
        let o = orchestrator(StubGateway::payload(TWO_USERS), seeded_store());

        o.export(1).await.unwrap();
        let first = stored(&o);
        o.export(1).await.unwrap();

        assert_eq!(stored(&o), first);
        assert_eq!(o.gateway().calls(), 2);
    }

    #[tokio::test]
    async fn test_procedure_timeout() {
        let gateway = StubGateway::new(Script::Sleep(Duration::from_secs(30)));
        let o = ExportOrchestrator::new(
            gateway,
            DatasetParser::new("usuarios"),
            DocumentStoreWriter::new(seeded_store(), "usuarios"),
            Duration::from_millis(50),
        );

        let err = o.export(1).await.unwrap_err();

        assert!(matches!(err, ExportError::Procedure(ProcedureError::Timeout(_))));
        assert_eq!(user_ids(&o), vec![99]);
    }

    #[tokio::test]
    async fn test_invalid_tenant_never_calls_procedure() {
        let o = orchestrator(StubGateway::payload(TWO_USERS), seeded_store());

        let err = o.export(0).await.unwrap_err();

        assert!(matches!(err, ExportError::Procedure(ProcedureError::InvalidTenant(0))));
        assert_eq!(o.gateway().calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_does_not_start() {
        let token = CancellationToken::new();
        token.cancel();
        let o = orchestrator(StubGateway::payload(TWO_USERS), seeded_store())
            .with_cancellation(token);

        let err = o.export(1).await.unwrap_err();

        assert!(matches!(err, ExportError::Cancelled { stage: "invoking" }));
        assert_eq!(o.gateway().calls(), 0);
        assert_eq!(user_ids(&o), vec![99]);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let o = orchestrator(StubGateway::payload(TWO_USERS), seeded_store());

        let report = o.export_dry_run(1).await.unwrap();

        assert_eq!(report.records, 2);
        assert!(!report.written);
        assert!(report.message().starts_with("Dry run"));
        assert_eq!(user_ids(&o), vec![99]);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ExportState::Writing.to_string(), "writing");
        assert_eq!(ExportState::Failed("boom".into()).to_string(), "failed(boom)");
    }
}
