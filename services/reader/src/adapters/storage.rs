//! services/reader/src/adapters/storage.rs
//!
//! `ObjectStorage` implementation for the backend's storage buckets.

use async_trait::async_trait;
use novel_reader_core::domain::UploadFile;
use novel_reader_core::ports::{ObjectStorage, PortResult, UploadOptions};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use tracing::debug;

use crate::adapters::client::{check, transport_error, SupabaseClient};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[async_trait]
impl ObjectStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &UploadFile,
        options: UploadOptions,
    ) -> PortResult<()> {
        let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        let response = self
            .http
            .post(self.storage_url(bucket, path))
            .bearer_auth(self.bearer().await)
            .header(CACHE_CONTROL, format!("max-age={}", options.cache_control_secs))
            .header("x-upsert", options.upsert.to_string())
            .header(CONTENT_TYPE, content_type)
            .body(file.data.clone())
            .send()
            .await
            .map_err(transport_error)?;
        check(response, "upload").await?;
        debug!("Uploaded {} bytes to {}/{}", file.data.len(), bucket, path);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn public_url_points_at_the_public_object_route() {
        let config = Config::from_lookup(|key| match key {
            "SUPABASE_URL" => Some("https://demo.supabase.co".to_string()),
            "SUPABASE_ANON_KEY" => Some("anon".to_string()),
            _ => None,
        })
        .unwrap();
        let client = SupabaseClient::new(&config).unwrap();

        assert_eq!(
            client.public_url("profile_pictures", "u-1.png"),
            "https://demo.supabase.co/storage/v1/object/public/profile_pictures/u-1.png"
        );
    }
}
