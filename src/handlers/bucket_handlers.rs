//! HTTP handlers for bucket operations.
//!
//! The caller is named by the `x-principal` header and resolved through the
//! character directory. All authorization and validation happens in
//! `BucketService`; handlers only translate requests and results.

use crate::{
    errors::AppError,
    models::{
        bucket::{BucketAccess, BucketSummary, JobId},
        principal::Principal,
    },
    services::bucket_service::{AccessChange, BucketService, SettingOutcome},
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

/// Header carrying the calling character's name.
pub const PRINCIPAL_HEADER: &str = "x-principal";

#[derive(Debug, Deserialize)]
pub struct CreateBucketReq {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameBucketReq {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetSettingReq {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessReq {
    pub action: String,
    pub character: String,
}

#[derive(Debug, Serialize)]
pub struct MonitorResp {
    pub bucket: String,
    pub monitoring: bool,
}

/// Resolve the caller from the request headers.
fn caller(service: &BucketService, headers: &HeaderMap) -> Result<Principal, AppError> {
    let name = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthenticated("missing x-principal header"))?;
    service
        .resolve(name)
        .ok_or_else(|| AppError::unauthenticated("unknown principal"))
}

/// GET `/buckets`: buckets visible to the caller.
pub async fn list_buckets(
    State(service): State<BucketService>,
    headers: HeaderMap,
) -> Result<Json<Vec<BucketSummary>>, AppError> {
    let who = caller(&service, &headers)?;
    Ok(Json(service.list_visible(&who).await))
}

/// POST `/buckets`: create a bucket.
pub async fn create_bucket(
    State(service): State<BucketService>,
    headers: HeaderMap,
    Json(req): Json<CreateBucketReq>,
) -> Result<impl IntoResponse, AppError> {
    let who = caller(&service, &headers)?;
    let description = req.description.unwrap_or_default();
    let summary = service.create(&who, &req.name, &description).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET `/buckets/{bucket}`: single bucket snapshot.
pub async fn bucket_info(
    State(service): State<BucketService>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> Result<Json<BucketSummary>, AppError> {
    let who = caller(&service, &headers)?;
    Ok(Json(service.info(&who, &bucket).await?))
}

/// DELETE `/buckets/{bucket}`: delete an empty bucket.
pub async fn delete_bucket(
    State(service): State<BucketService>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let who = caller(&service, &headers)?;
    service.delete(&who, &bucket).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/buckets/{bucket}/rename`
pub async fn rename_bucket(
    State(service): State<BucketService>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RenameBucketReq>,
) -> Result<Json<BucketSummary>, AppError> {
    let who = caller(&service, &headers)?;
    Ok(Json(service.rename(&who, &bucket, &req.name).await?))
}

/// PUT `/buckets/{bucket}/settings/{key}`
pub async fn set_setting(
    State(service): State<BucketService>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<SetSettingReq>,
) -> Result<Json<SettingOutcome>, AppError> {
    let who = caller(&service, &headers)?;
    Ok(Json(
        service.set_setting(&who, &bucket, &key, &req.value).await?,
    ))
}

/// POST `/buckets/{bucket}/access`: toggle an action for a character.
pub async fn toggle_access(
    State(service): State<BucketService>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AccessReq>,
) -> Result<Json<AccessChange>, AppError> {
    let who = caller(&service, &headers)?;
    Ok(Json(
        service
            .toggle_access(&who, &bucket, &req.action, &req.character)
            .await?,
    ))
}

/// POST `/buckets/{bucket}/monitor`
pub async fn toggle_monitor(
    State(service): State<BucketService>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MonitorResp>, AppError> {
    let who = caller(&service, &headers)?;
    let monitoring = service.toggle_monitor(&who, &bucket).await?;
    Ok(Json(MonitorResp { bucket, monitoring }))
}

/// GET `/characters/{character}/access`: per-bucket actions report.
pub async fn check_access(
    State(service): State<BucketService>,
    Path(character): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<BucketAccess>>, AppError> {
    let who = caller(&service, &headers)?;
    Ok(Json(service.check(&who, &character).await?))
}

/// PUT `/buckets/{bucket}/jobs/{job}`: tag a job to the bucket.
pub async fn tag_job(
    State(service): State<BucketService>,
    Path((bucket, job)): Path<(String, JobId)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let who = caller(&service, &headers)?;
    service.tag_job(&who, &bucket, job).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE `/buckets/{bucket}/jobs/{job}`: untag a job.
pub async fn untag_job(
    State(service): State<BucketService>,
    Path((bucket, job)): Path<(String, JobId)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let who = caller(&service, &headers)?;
    service.untag_job(&who, &bucket, job).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/buckets/{bucket}/jobs/{job}/resolve`
pub async fn resolve_job(
    State(service): State<BucketService>,
    Path((bucket, job)): Path<(String, JobId)>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let who = caller(&service, &headers)?;
    service.resolve_job(&who, &bucket, job).await?;
    Ok(StatusCode::NO_CONTENT)
}
