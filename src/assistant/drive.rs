//! Google Drive v3 access for the document library.
//!
//! The library is an external system: this module only lists, downloads and uploads
//! PDFs through the REST API. [`DriveApi`] is the seam the tools depend on so they can
//! be exercised without a network.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{AuthError, TokenSource};
use crate::clients::http_pool::get_http_client;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
pub const PDF_MIME_TYPE: &str = "application/pdf";

const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime";

/// A file entry as returned by `files.list` / `files.create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes; Drive reports it as a decimal string.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameQuery {
    Contains(String),
    Equals(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("request failed: {0}")]
    Request(String),
    #[error("Drive API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        DriveError::Request(err.to_string())
    }
}

#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Non-trashed PDFs whose name matches `query`, at most `limit` of them.
    async fn search_pdfs(&self, query: &NameQuery, limit: usize)
        -> Result<Vec<DriveFile>, DriveError>;

    /// Raw content of a file.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError>;

    /// Store a PDF in the library.
    async fn upload_pdf(&self, name: &str, bytes: Vec<u8>) -> Result<DriveFile, DriveError>;
}

/// Resolve an approximate filename: exact-name lookup first, then a contains-match.
pub async fn find_pdf(drive: &dyn DriveApi, name: &str) -> Result<Option<DriveFile>, DriveError> {
    let exact = drive.search_pdfs(&NameQuery::Equals(name.to_string()), 1).await?;
    if let Some(file) = exact.into_iter().next() {
        return Ok(Some(file));
    }
    let partial = drive
        .search_pdfs(&NameQuery::Contains(name.to_string()), 1)
        .await?;
    Ok(partial.into_iter().next())
}

/// Build a `files.list` query string restricted to PDFs that are not trashed.
pub fn pdf_query(name: &NameQuery, folder_id: Option<&str>) -> String {
    let name_clause = match name {
        NameQuery::Contains(s) => format!("name contains '{}'", escape_query_value(s)),
        NameQuery::Equals(s) => format!("name = '{}'", escape_query_value(s)),
    };
    let mut query = format!(
        "{} and mimeType = '{}' and trashed = false",
        name_clause, PDF_MIME_TYPE
    );
    if let Some(folder) = folder_id {
        query.push_str(&format!(" and '{}' in parents", escape_query_value(folder)));
    }
    query
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// REST client for Drive v3.
pub struct DriveClient {
    tokens: Arc<dyn TokenSource>,
    api_base: String,
    folder_id: Option<String>,
}

impl DriveClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        Self::new_with_base_url(tokens, DEFAULT_API_BASE)
    }

    pub fn new_with_base_url(tokens: Arc<dyn TokenSource>, api_base: &str) -> Self {
        Self {
            tokens,
            api_base: api_base.trim_end_matches('/').to_string(),
            folder_id: None,
        }
    }

    /// Restrict searches to, and place uploads in, one folder.
    pub fn with_folder(mut self, folder_id: Option<String>) -> Self {
        self.folder_id = folder_id;
        self
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, DriveError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        Err(DriveError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn search_pdfs(
        &self,
        query: &NameQuery,
        limit: usize,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let q = pdf_query(query, self.folder_id.as_deref());
        log::debug!("Drive files.list q={}", q);

        let token = self.tokens.access_token().await?;
        let http = get_http_client(&self.api_base)?;
        let page_size = limit.clamp(1, 1000).to_string();
        let fields = format!("files({})", FILE_FIELDS);
        let response = http
            .get(format!("{}/drive/v3/files", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("q", q.as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", fields.as_str()),
                ("orderBy", "name"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;

        let list: FileList = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(|e| DriveError::Decode(e.to_string()))?;
        let mut files = list.files;
        files.truncate(limit);
        Ok(files)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let token = self.tokens.access_token().await?;
        let http = get_http_client(&self.api_base)?;
        let response = http
            .get(format!(
                "{}/drive/v3/files/{}",
                self.api_base,
                urlencoding::encode(file_id)
            ))
            .bearer_auth(token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;

        let bytes = Self::checked(response).await?.bytes().await?;
        log::debug!("downloaded {} bytes for file {}", bytes.len(), file_id);
        Ok(bytes.to_vec())
    }

    async fn upload_pdf(&self, name: &str, bytes: Vec<u8>) -> Result<DriveFile, DriveError> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": PDF_MIME_TYPE,
        });
        if let Some(folder) = &self.folder_id {
            metadata["parents"] = serde_json::json!([folder]);
        }

        let boundary = format!("piping-assistant-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(&boundary, &metadata, &bytes);

        let token = self.tokens.access_token().await?;
        let http = get_http_client(&self.api_base)?;
        let response = http
            .post(format!("{}/upload/drive/v3/files", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let file: DriveFile = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(|e| DriveError::Decode(e.to_string()))?;
        log::info!("uploaded {} to the library as {}", name, file.id);
        Ok(file)
    }
}

fn multipart_related_body(boundary: &str, metadata: &serde_json::Value, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            meta = metadata,
            mime = PDF_MIME_TYPE
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
