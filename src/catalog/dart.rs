//! DART company-directory source.
//!
//! Fetches `corpCode.xml` — a ZIP archive holding a single XML file that
//! lists every corporation known to DART. A bad or rate-limited key makes
//! the endpoint return a small JSON/XML error body instead of an archive,
//! detected here by the missing ZIP magic.

use super::{CatalogError, EntitySource};
use crate::Entity;
use async_trait::async_trait;
use serde::Deserialize;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://opendart.fss.or.kr";
const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(30);

/// Entity source backed by the DART `corpCode.xml` endpoint.
pub struct DartEntitySource {
    client: reqwest::Client,
    base_url: String,
}

impl DartEntitySource {
    /// Create a source against the production DART host.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a source against a custom host (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for DartEntitySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitySource for DartEntitySource {
    async fn load(&self, credential: &str) -> Result<Vec<Entity>, CatalogError> {
        let url = format!("{}/api/corpCode.xml", self.base_url);
        debug!(url = %url, "fetching corporation directory");

        let response = self
            .client
            .get(&url)
            .query(&[("crtfc_key", credential)])
            .timeout(DIRECTORY_TIMEOUT)
            .send()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Http(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        if !bytes.starts_with(b"PK") {
            let preview: String = String::from_utf8_lossy(&bytes)
                .replace('\n', " ")
                .chars()
                .take(200)
                .collect();
            return Err(CatalogError::NotZip(preview));
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_ref()))
            .map_err(|e| CatalogError::Archive(e.to_string()))?;
        if archive.is_empty() {
            return Err(CatalogError::Archive("archive has no entries".to_string()));
        }
        let mut xml = String::new();
        archive
            .by_index(0)
            .map_err(|e| CatalogError::Archive(e.to_string()))?
            .read_to_string(&mut xml)
            .map_err(|e| CatalogError::Archive(e.to_string()))?;

        parse_directory_xml(&xml)
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryIndex {
    #[serde(rename = "list", default)]
    list: Vec<DirectoryEntry>,
}

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    #[serde(default)]
    corp_code: String,
    #[serde(default)]
    corp_name: String,
    #[serde(default)]
    stock_code: String,
}

/// Parse the unzipped directory XML into entities.
///
/// DART pads `stock_code` with a single space for unlisted companies, so
/// every field is trimmed; entries without a corp code are dropped.
pub(crate) fn parse_directory_xml(xml: &str) -> Result<Vec<Entity>, CatalogError> {
    let index: DirectoryIndex =
        quick_xml::de::from_str(xml).map_err(|e| CatalogError::Malformed(e.to_string()))?;

    Ok(index
        .list
        .into_iter()
        .filter_map(|e| {
            let corp_code = e.corp_code.trim().to_string();
            if corp_code.is_empty() {
                return None;
            }
            Some(Entity {
                corp_code,
                corp_name: e.corp_name.trim().to_string(),
                stock_code: e.stock_code.trim().to_string(),
            })
        })
        .collect())
}
