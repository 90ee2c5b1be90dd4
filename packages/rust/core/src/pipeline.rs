//! End-to-end `ingest` pipeline: source page → PDFs → schedule entries → store.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use bellgrid_fetch::{DocumentLink, FetchOptions, SourceClient};
use bellgrid_shared::{
    BellgridError, DocumentRecord, ExtractionMode, Result, ScheduleConventions,
};
use bellgrid_storage::Storage;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::documents::{content_hash, extract_and_parse, save_document};

/// Configuration for the `ingest` pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Page listing the schedule PDFs, or a single PDF.
    pub source_url: Url,
    pub mode: ExtractionMode,
    /// Re-parse documents whose content hash is unchanged.
    pub force: bool,
    /// Wipe the store before ingesting.
    pub clear: bool,
    /// Where downloaded PDFs are kept.
    pub download_dir: PathBuf,
    pub fetch: FetchOptions,
    pub conventions: ScheduleConventions,
}

/// What happened to one document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Ingested {
        entries: usize,
        mode: ExtractionMode,
    },
    /// Same bytes as the last ingest; stored entries kept.
    Unchanged,
    Failed {
        error: String,
    },
}

/// Per-document line of an [`IngestReport`].
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub name: String,
    pub url: Url,
    pub outcome: DocumentOutcome,
}

/// Result of the `ingest` pipeline.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub documents: Vec<DocumentReport>,
    /// Entries removed by `clear`, when requested.
    pub cleared: Option<u64>,
    pub elapsed: Duration,
}

impl IngestReport {
    pub fn ingested(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Ingested { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Failed { .. }))
    }

    /// Entries written during this run.
    pub fn entries(&self) -> usize {
        self.documents
            .iter()
            .map(|d| match d.outcome {
                DocumentOutcome::Ingested { entries, .. } => entries,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&DocumentOutcome) -> bool) -> usize {
        self.documents.iter().filter(|d| pred(&d.outcome)).count()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a document is downloaded.
    fn document_started(&self, name: &str, current: usize, total: usize);
    /// Called once a document has an outcome.
    fn document_finished(&self, report: &DocumentReport);
    /// Called when the pipeline completes.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn document_finished(&self, _report: &DocumentReport) {}
    fn done(&self, _report: &IngestReport) {}
}

/// Run the full `ingest` pipeline.
///
/// 1. Optionally clear the store
/// 2. Discover document links at the source
/// 3. Per document, in order: download, save, hash, extract, parse, store
///
/// Discovery failures abort the run. A failing document is recorded in the
/// report and the run moves on.
#[instrument(skip_all, fields(source = %config.source_url, mode = %config.mode))]
pub async fn ingest(
    config: &IngestConfig,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    let start = Instant::now();
    let mut report = IngestReport::default();

    if config.clear {
        progress.phase("Clearing store");
        report.cleared = Some(storage.clear_all().await?);
    }

    progress.phase("Discovering documents");
    let client = SourceClient::new(config.fetch.clone())?;
    let links = client.discover(&config.source_url).await?;
    let total = links.len();

    progress.phase("Ingesting documents");
    for (i, link) in links.into_iter().enumerate() {
        progress.document_started(&link.name, i + 1, total);

        let outcome = match ingest_document(config, storage, &client, &link).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(document = %link.name, url = %link.url, error = %e, "document failed");
                DocumentOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let doc_report = DocumentReport {
            name: link.name,
            url: link.url,
            outcome,
        };
        progress.document_finished(&doc_report);
        report.documents.push(doc_report);
    }

    report.elapsed = start.elapsed();
    info!(
        documents = total,
        ingested = report.ingested(),
        unchanged = report.unchanged(),
        failed = report.failed(),
        entries = report.entries(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "ingest complete"
    );

    progress.done(&report);
    Ok(report)
}

/// Download, parse, and store one document.
async fn ingest_document(
    config: &IngestConfig,
    storage: &Storage,
    client: &SourceClient,
    link: &DocumentLink,
) -> Result<DocumentOutcome> {
    let bytes = client.download(&link.url).await?;
    let path = save_document(&config.download_dir, &link.name, &bytes)?;
    let hash = content_hash(&bytes);
    debug!(document = %link.name, path = %path.display(), %hash, "document saved");

    let academic_year = config.conventions.academic_year_start;
    if !config.force {
        if let Some(previous) = storage.get_document(&link.name).await? {
            if previous.content_hash == hash
                && previous.academic_year_start == Some(academic_year)
            {
                debug!(document = %link.name, "content unchanged, skipped");
                return Ok(DocumentOutcome::Unchanged);
            }
        }
    }

    let name = link.name.clone();
    let mode = config.mode;
    let conventions = config.conventions.clone();
    let parsed = tokio::task::spawn_blocking(move || {
        extract_and_parse(&name, &bytes, mode, &conventions)
    })
    .await
    .map_err(|e| BellgridError::Extraction(format!("parser task failed: {e}")))??;

    let entries = &parsed.schedule.entries;
    if entries.is_empty() {
        warn!(document = %link.name, "no schedule entries found");
    }

    storage.replace_document_entries(&link.name, entries).await?;
    storage
        .upsert_document(&DocumentRecord {
            name: link.name.clone(),
            source_url: Some(link.url.to_string()),
            content_hash: hash,
            entry_count: entries.len(),
            ingested_at: Utc::now(),
            academic_year_start: Some(academic_year),
        })
        .await?;

    info!(
        document = %link.name,
        entries = entries.len(),
        mode = %parsed.mode,
        "document ingested"
    );
    Ok(DocumentOutcome::Ingested {
        entries: entries.len(),
        mode: parsed.mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bellgrid_pdf::test_pdf::two_day_week;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"
        <h1>Bell schedules</h1>
        <a href="/files/April%206th%20-%2010th.pdf">This week</a>
    "#;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("bellgrid_ingest_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn config(server: &MockServer) -> IngestConfig {
        IngestConfig {
            source_url: Url::parse(&format!("{}/schedules", server.uri())).unwrap(),
            mode: ExtractionMode::Auto,
            force: false,
            clear: false,
            download_dir: std::env::temp_dir().join(format!("bellgrid_dl_{}", Uuid::now_v7())),
            fetch: FetchOptions::default(),
            conventions: ScheduleConventions::default(),
        }
    }

    async fn serve(server: &MockServer, listing: &str) {
        Mock::given(method("GET"))
            .and(path("/schedules"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/April%206th%20-%2010th.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(two_day_week()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn ingests_discovered_documents() {
        let server = MockServer::start().await;
        serve(&server, LISTING).await;
        let storage = test_storage().await;
        let config = config(&server);

        let report = ingest(&config, &storage, &SilentProgress).await.unwrap();

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].name, "April 6th - 10th");
        assert_eq!(
            report.documents[0].outcome,
            DocumentOutcome::Ingested {
                entries: 2,
                mode: ExtractionMode::Layout
            }
        );

        let stored = storage.get_all().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].name, "Period 1");
        assert_eq!(stored[0].start_time.to_string(), "2026-04-06 08:00:00");
        assert_eq!(stored[1].start_time.to_string(), "2026-04-07 09:00:00");

        let record = storage.get_document("April 6th - 10th").await.unwrap().unwrap();
        assert_eq!(record.entry_count, 2);
        assert_eq!(record.content_hash, content_hash(&two_day_week()));
        assert!(config.download_dir.join("April 6th - 10th.pdf").exists());
    }

    #[tokio::test]
    async fn unchanged_documents_are_skipped_unless_forced() {
        let server = MockServer::start().await;
        serve(&server, LISTING).await;
        let storage = test_storage().await;
        let mut config = config(&server);

        ingest(&config, &storage, &SilentProgress).await.unwrap();
        let again = ingest(&config, &storage, &SilentProgress).await.unwrap();
        assert_eq!(again.unchanged(), 1);
        assert_eq!(again.entries(), 0);
        assert_eq!(storage.get_all().await.unwrap().len(), 2);

        config.force = true;
        let forced = ingest(&config, &storage, &SilentProgress).await.unwrap();
        assert_eq!(forced.ingested(), 1);
        // Replaced, not duplicated.
        assert_eq!(storage.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn academic_year_change_reparses_unchanged_documents() {
        let server = MockServer::start().await;
        serve(&server, LISTING).await;
        let storage = test_storage().await;
        let mut config = config(&server);

        ingest(&config, &storage, &SilentProgress).await.unwrap();

        config.conventions = config.conventions.with_academic_year(2026);
        let report = ingest(&config, &storage, &SilentProgress).await.unwrap();
        assert_eq!(report.ingested(), 1);
        assert_eq!(report.unchanged(), 0);

        let stored = storage.get_all().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].start_time.to_string(), "2027-04-06 08:00:00");
        let record = storage.get_document("April 6th - 10th").await.unwrap().unwrap();
        assert_eq!(record.academic_year_start, Some(2026));
    }

    #[tokio::test]
    async fn failing_document_does_not_stop_the_batch() {
        let server = MockServer::start().await;
        let listing = r#"
            <a href="/files/Broken.pdf">Broken</a>
            <a href="/files/April%206th%20-%2010th.pdf">This week</a>
        "#;
        serve(&server, listing).await;
        Mock::given(method("GET"))
            .and(path("/files/Broken.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a pdf".to_vec()))
            .mount(&server)
            .await;

        let storage = test_storage().await;
        let report = ingest(&config(&server), &storage, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.ingested(), 1);
        assert!(matches!(
            report.documents[0].outcome,
            DocumentOutcome::Failed { .. }
        ));
        assert_eq!(storage.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_wipes_store_first() {
        let server = MockServer::start().await;
        serve(&server, "<p>No schedules posted</p>").await;
        let storage = test_storage().await;
        let day = chrono::NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        let old = bellgrid_shared::ScheduleEntry {
            name: "Period 1".into(),
            start_time: day.and_hms_opt(8, 0, 0).unwrap(),
            end_time: day.and_hms_opt(8, 50, 0).unwrap(),
        };
        storage.insert_many("old", &[old]).await.unwrap();

        let mut config = config(&server);
        config.clear = true;
        let report = ingest(&config, &storage, &SilentProgress).await.unwrap();

        assert_eq!(report.cleared, Some(1));
        assert!(report.documents.is_empty());
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_source_is_an_error() {
        let server = MockServer::start().await;
        let storage = test_storage().await;
        let err = ingest(&config(&server), &storage, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, BellgridError::Network(_)));
    }
}
