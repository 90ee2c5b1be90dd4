//! Schedule PDF discovery and download.
//!
//! Schools publish their weekly schedules as PDF links on a listing page,
//! sometimes one hop away behind a "Download" link. [`SourceClient::discover`]
//! collects those links; [`SourceClient::download`] fetches one document with
//! a size cap.

mod links;

use std::collections::HashSet;
use std::time::Duration;

use bellgrid_shared::{BellgridError, Result, SourceConfig};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use links::{DocumentLink, find_document_links, find_download_pages};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Maximum number of "download" pages followed from the listing page.
const MAX_DOWNLOAD_PAGES: usize = 10;

/// Listing pages larger than this are rejected (5 MB).
const MAX_PAGE_SIZE: u64 = 5 * 1024 * 1024;

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("Bellgrid/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// HTTP settings for a [`SourceClient`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout_secs: u64,
    /// Documents larger than this are rejected.
    pub max_document_bytes: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&SourceConfig::default())
    }
}

impl From<&SourceConfig> for FetchOptions {
    fn from(source: &SourceConfig) -> Self {
        Self {
            timeout_secs: source.timeout_secs,
            max_document_bytes: source.max_document_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceClient
// ---------------------------------------------------------------------------

/// HTTP client for a schedule source.
#[derive(Debug, Clone)]
pub struct SourceClient {
    client: Client,
    opts: FetchOptions,
}

impl SourceClient {
    pub fn new(opts: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| BellgridError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, opts })
    }

    /// Collect the schedule PDFs published at `url`.
    ///
    /// A URL that is itself a PDF yields that one document. Otherwise the
    /// page's own PDF links come first, followed by those found on its
    /// download pages. A download page that fails to load is skipped.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn discover(&self, url: &Url) -> Result<Vec<DocumentLink>> {
        if url.path().to_ascii_lowercase().ends_with(".pdf") {
            debug!("source URL is a document");
            return Ok(vec![DocumentLink::from_url(url.clone())]);
        }

        let html = self.fetch_page(url).await?;
        let mut documents = find_document_links(&html, url);
        let download_pages = find_download_pages(&html, url);

        debug!(
            documents = documents.len(),
            download_pages = download_pages.len(),
            "read listing page"
        );

        if download_pages.len() > MAX_DOWNLOAD_PAGES {
            warn!(
                found = download_pages.len(),
                max = MAX_DOWNLOAD_PAGES,
                "too many download pages, following the first ones only"
            );
        }

        for page in download_pages.iter().take(MAX_DOWNLOAD_PAGES) {
            match self.fetch_page(page).await {
                Ok(html) => documents.extend(find_document_links(&html, page)),
                Err(e) => warn!(page = %page, error = %e, "download page skipped"),
            }
        }

        let mut seen = HashSet::new();
        documents.retain(|doc| seen.insert(doc.url.to_string()));

        info!(documents = documents.len(), "documents discovered");
        Ok(documents)
    }

    /// Fetch an HTML page as text.
    pub async fn fetch_page(&self, url: &Url) -> Result<String> {
        let response = self.get(url).await?;

        if let Some(len) = response.content_length() {
            if len > MAX_PAGE_SIZE {
                return Err(BellgridError::validation(format!(
                    "{url}: page too large ({len} bytes, max {MAX_PAGE_SIZE})"
                )));
            }
        }

        response
            .text()
            .await
            .map_err(|e| BellgridError::Network(format!("{url}: failed to read body: {e}")))
    }

    /// Download a document, rejecting bodies over `max_document_bytes`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let max = self.opts.max_document_bytes;
        let mut response = self.get(url).await?;

        if let Some(len) = response.content_length() {
            if len > max {
                return Err(too_large(url, len, max));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| BellgridError::Network(format!("{url}: failed to read body: {e}")))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > max {
                return Err(too_large(url, body.len() as u64, max));
            }
        }

        debug!(bytes = body.len(), "document downloaded");
        Ok(body)
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| BellgridError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BellgridError::Network(format!("{url}: HTTP {status}")));
        }
        Ok(response)
    }
}

fn too_large(url: &Url, len: u64, max: u64) -> BellgridError {
    BellgridError::validation(format!(
        "{url}: document too large ({len} bytes, max {max})"
    ))
}
