//! Wire payloads for the admin backend. Field names follow the backend's JSON
//! (a mix of snake_case and camelCase), with `#[serde(rename)]` wherever the
//! Rust name differs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AccessLevel, FileId, ProgramId};

/// Stored-file reference returned by `POST /admin/setting/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(rename = "_id")]
    pub id: FileId,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "uploadedFile")]
    pub uploaded_file: UploadedFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamOptionPayload {
    pub text: String,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamQuestionPayload {
    pub question_title: String,
    pub options: Vec<ExamOptionPayload>,
    pub points: f64,
}

/// One authored subject inside a creation request. `video_file` is serialized
/// as `null` when the subject was submitted without an uploaded video; the
/// backend accepts that today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseObjectPayload {
    pub title: String,
    pub description: String,
    pub video_file: Option<FileId>,
    pub order: u32,
    pub exam: Vec<ExamQuestionPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProgramRequest {
    pub title: String,
    pub description: String,
    pub amount: u64,
    pub is_have_penalty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_fee: Option<u64>,
    pub course_object: Vec<CourseObjectPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramPayload {
    #[serde(rename = "_id")]
    pub id: ProgramId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "accessLevel", default)]
    pub access_level: Option<AccessLevel>,
    #[serde(rename = "isPublished", default)]
    pub is_published: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProgramResponse {
    pub program: ProgramPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramListResponse {
    pub programs: Vec<ProgramPayload>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgramListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(rename = "accessLevel", skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AccessLevel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateAccessLevelRequest {
    #[serde(rename = "accessLevel")]
    pub access_level: AccessLevel,
}

/// Both OTP endpoints take the same body; for `validate-otp` the `password`
/// field carries the one-time code, mirroring how the web dashboard calls it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub mobile: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
