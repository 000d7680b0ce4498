//! Dataset backend client
//!
//! Client side of the two backend endpoints the dashboard depends on: the
//! CSV upload that starts a session and the summary fetch that seeds the
//! conversation.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use url::Url;

use crate::conversation::DatasetSummary;
use crate::{Error, Result};

/// Source of the dataset summary the conversation is grounded on
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Fetch the summary of the currently uploaded dataset
    ///
    /// # Errors
    ///
    /// Returns [`Error::SummaryUnavailable`] if no summary can be produced
    async fn fetch_summary(&self) -> Result<DatasetSummary>;
}

/// Server acknowledgement of an upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryBody {
    summary: Option<serde_json::Value>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the dataset backend
#[derive(Debug, Clone)]
pub struct DatasetClient {
    client: Client,
    base_url: Url,
}

impl DatasetClient {
    /// Create a client for the backend at `base_url`
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Backend base URL
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Upload a CSV file as the session dataset
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadFailed`] if the file is not a CSV or the server
    /// rejects it, or an IO error if the file cannot be read
    pub async fn upload_csv(&self, path: &Path) -> Result<UploadReceipt> {
        if !is_csv(path) {
            return Err(Error::UploadFailed(format!(
                "{} is not a .csv file",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .map_or_else(|| "data.csv".to_string(), |n| n.to_string_lossy().into_owned());
        let bytes = tokio::fs::read(path).await?;
        tracing::info!(file = %file_name, bytes = bytes.len(), "uploading dataset");

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::UploadFailed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("server returned {status}"));
            return Err(Error::UploadFailed(reason));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::UploadFailed(format!("unexpected upload response: {e}")))
    }
}

#[async_trait]
impl SummaryProvider for DatasetClient {
    async fn fetch_summary(&self) -> Result<DatasetSummary> {
        let response = self
            .client
            .get(self.endpoint("summary"))
            .send()
            .await
            .map_err(|e| Error::SummaryUnavailable(e.to_string()))?;

        let status = response.status();
        let body: SummaryBody = response.json().await.unwrap_or_default();

        if let Some(error) = body.error {
            return Err(Error::SummaryUnavailable(error));
        }
        if !status.is_success() {
            return Err(Error::SummaryUnavailable(format!("server returned {status}")));
        }

        body.summary
            .and_then(DatasetSummary::from_value)
            .ok_or_else(|| Error::SummaryUnavailable("response carried no summary".to_string()))
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}
