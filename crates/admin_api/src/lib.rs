//! Typed REST bindings for the platform's admin backend.
//!
//! One [`AdminApi`] instance wraps a shared `reqwest` client plus the bearer
//! token for the active session; every admin endpoint the tooling consumes is
//! a method here, so callers never touch URLs or auth headers themselves.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use reqwest::{multipart, Body, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AccessLevel, ProgramId},
    error::{ApiException, ErrorBody, ErrorCode},
    protocol::{
        CreateProgramRequest, CreateProgramResponse, LoginRequest, LoginResponse, ProgramListQuery,
        ProgramListResponse, ProgramPayload, UpdateAccessLevelRequest, UploadResponse, UploadedFile,
    },
};
use tokio::{
    fs::File,
    io::AsyncReadExt,
    sync::{mpsc, watch, RwLock},
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use url::Url;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub struct AdminApi {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl AdminApi {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
            token: RwLock::new(None),
        }
    }

    pub fn with_token(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            token: RwLock::new(Some(token.into())),
        }
    }

    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // Url::join treats the last segment of a base without a trailing slash
        // as a file name, so normalize both sides.
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .with_context(|| format!("invalid endpoint url for path '{path}'"))
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Requests a one-time code for the given mobile number. The code itself
    /// arrives out of band (SMS); follow up with [`AdminApi::validate_otp`].
    pub async fn request_login_otp(&self, mobile: &str, password: &str) -> Result<()> {
        let request = LoginRequest {
            mobile: mobile.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(self.endpoint("auth/login-otp")?)
            .json(&request)
            .send()
            .await
            .context("login-otp request failed")?;
        expect_success(response).await?;
        info!(mobile, "otp requested");
        Ok(())
    }

    /// Exchanges the one-time code for a bearer token and installs it on this
    /// client for subsequent calls.
    pub async fn validate_otp(&self, mobile: &str, code: &str) -> Result<String> {
        let request = LoginRequest {
            mobile: mobile.to_string(),
            password: code.to_string(),
        };
        let response = self
            .http
            .post(self.endpoint("auth/validate-otp")?)
            .json(&request)
            .send()
            .await
            .context("validate-otp request failed")?;
        let decoded: LoginResponse = decode_response(response).await?;
        self.set_token(decoded.token.clone()).await;
        info!(mobile, "otp validated, session token installed");
        Ok(decoded.token)
    }

    pub async fn list_programs(&self, query: &ProgramListQuery) -> Result<ProgramListResponse> {
        let builder = self
            .http
            .get(self.endpoint("admin/setting/set/coach-course-program/set-access-level")?)
            .query(query);
        let response = self
            .authorized(builder)
            .await
            .send()
            .await
            .context("program list request failed")?;
        decode_response(response).await
    }

    pub async fn create_program(&self, request: &CreateProgramRequest) -> Result<ProgramPayload> {
        let builder = self
            .http
            .post(self.endpoint("admin/setting/set/coach-course-program/set-access-level")?)
            .json(request);
        let response = self
            .authorized(builder)
            .await
            .send()
            .await
            .context("program creation request failed")?;
        let decoded: CreateProgramResponse = decode_response(response).await?;
        info!(program_id = %decoded.program.id, title = %decoded.program.title, "program created");
        Ok(decoded.program)
    }

    pub async fn update_access_level(
        &self,
        id: &ProgramId,
        access_level: AccessLevel,
    ) -> Result<ProgramPayload> {
        let path = format!("admin/setting/set/coach-course-program/{id}/access-level");
        let builder = self
            .http
            .patch(self.endpoint(&path)?)
            .json(&UpdateAccessLevelRequest { access_level });
        let response = self
            .authorized(builder)
            .await
            .send()
            .await
            .context("access-level update request failed")?;
        let decoded: CreateProgramResponse = decode_response(response).await?;
        Ok(decoded.program)
    }

    pub async fn delete_program(&self, id: &ProgramId) -> Result<()> {
        let path = format!("admin/setting/set/coach-course-program/set-access-level/{id}");
        let builder = self.http.delete(self.endpoint(&path)?);
        let response = self
            .authorized(builder)
            .await
            .send()
            .await
            .context("program delete request failed")?;
        expect_success(response).await?;
        info!(program_id = %id, "program deleted");
        Ok(())
    }

    /// Uploads one file as the multipart field `file`, streaming it from disk
    /// in fixed-size chunks. `progress` receives 0..=100 as chunks are handed
    /// to the transport, so the last values can run slightly ahead of bytes
    /// acknowledged by the server.
    pub async fn upload_file(
        &self,
        path: &Path,
        progress: watch::Sender<u8>,
    ) -> Result<UploadedFile> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("upload path has no usable file name: {}", path.display()))?;

        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open '{}' for upload", path.display()))?;
        let total_bytes = file
            .metadata()
            .await
            .with_context(|| format!("failed to stat '{}'", path.display()))?
            .len();

        let (chunk_tx, chunk_rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(4);
        tokio::spawn(stream_file_chunks(file, total_bytes, chunk_tx, progress));

        let part = multipart::Part::stream_with_length(
            Body::wrap_stream(ReceiverStream::new(chunk_rx)),
            total_bytes,
        )
        .file_name(file_name.clone())
        .mime_str("application/octet-stream")
        .context("invalid upload mime type")?;
        let form = multipart::Form::new().part("file", part);

        let builder = self
            .http
            .post(self.endpoint("admin/setting/upload")?)
            .multipart(form);
        let response = self
            .authorized(builder)
            .await
            .send()
            .await
            .with_context(|| format!("upload request for '{file_name}' failed"))?;
        let decoded: UploadResponse = decode_response(response).await?;
        info!(
            file_id = %decoded.uploaded_file.id,
            file_name = %decoded.uploaded_file.file_name,
            size_bytes = total_bytes,
            "file uploaded"
        );
        Ok(decoded.uploaded_file)
    }
}

async fn stream_file_chunks(
    mut file: File,
    total_bytes: u64,
    chunks: mpsc::Sender<std::io::Result<Vec<u8>>>,
    progress: watch::Sender<u8>,
) {
    let mut sent: u64 = 0;
    loop {
        let mut chunk = vec![0u8; UPLOAD_CHUNK_BYTES];
        match file.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => {
                chunk.truncate(read);
                sent += read as u64;
                if chunks.send(Ok(chunk)).await.is_err() {
                    // Receiver dropped: the request was aborted.
                    break;
                }
                let percent = if total_bytes == 0 {
                    100
                } else {
                    ((sent * 100) / total_bytes).min(100) as u8
                };
                let _ = progress.send(percent);
            }
            Err(error) => {
                let _ = chunks.send(Err(error)).await;
                break;
            }
        }
    }
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .context("failed to decode response body");
    }
    Err(error_from_response(response).await.into())
}

async fn expect_success(response: reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from_response(response).await.into())
}

async fn error_from_response(response: reqwest::Response) -> ApiException {
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("request failed with status {status}"));
    let exception = ApiException::from_status(status.as_u16(), message);
    if matches!(exception.code, ErrorCode::Internal) {
        warn!(status = status.as_u16(), message = %exception.message, "backend error");
    }
    exception
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
