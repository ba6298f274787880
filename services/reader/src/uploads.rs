//! services/reader/src/uploads.rs
//!
//! Pushes user-supplied files into public buckets and hands back their URLs.

use chrono::Utc;
use novel_reader_core::domain::{upload_file_name, UploadFile};
use novel_reader_core::ports::{ObjectStorage, PortResult, UploadOptions};
use tracing::error;
use uuid::Uuid;

pub const PROFILE_PICTURES_BUCKET: &str = "profile_pictures";
pub const NOVEL_COVERS_BUCKET: &str = "novel_covers";

/// Overwrite allowed, cached for one hour.
pub const UPLOAD_OPTIONS: UploadOptions = UploadOptions {
    cache_control_secs: 3600,
    upsert: true,
};

/// Uploads `file` as `{owner}-{timestamp_millis}.{ext}` and returns its public URL.
pub async fn upload_to_bucket(
    storage: &dyn ObjectStorage,
    bucket: &str,
    owner: &str,
    file: &UploadFile,
    timestamp_millis: i64,
) -> PortResult<String> {
    let file_name = upload_file_name(owner, timestamp_millis, file);
    storage.upload(bucket, &file_name, file, UPLOAD_OPTIONS).await?;
    Ok(storage.public_url(bucket, &file_name))
}

pub async fn upload_profile_picture(
    storage: &dyn ObjectStorage,
    file: &UploadFile,
    user_id: Uuid,
) -> PortResult<String> {
    let owner = user_id.to_string();
    upload_to_bucket(
        storage,
        PROFILE_PICTURES_BUCKET,
        &owner,
        file,
        Utc::now().timestamp_millis(),
    )
    .await
    .map_err(|e| {
        error!("Error uploading profile picture: {}", e);
        e
    })
}

pub async fn upload_novel_cover(
    storage: &dyn ObjectStorage,
    file: &UploadFile,
    novel_id: Uuid,
) -> PortResult<String> {
    let owner = novel_id.to_string();
    upload_to_bucket(
        storage,
        NOVEL_COVERS_BUCKET,
        &owner,
        file,
        Utc::now().timestamp_millis(),
    )
    .await
    .map_err(|e| {
        error!("Error uploading novel cover: {}", e);
        e
    })
}
