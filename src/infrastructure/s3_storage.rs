use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};

use crate::domain::repository::{ObjectInfo, ObjectStorage};

/// S3ObjectStorage はS3互換ストア(MinIO含む)に対する [`ObjectStorage`] 実装。
pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStorage {
    pub async fn new(
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(ref r) = region {
            config_loader = config_loader.region(aws_config::Region::new(r.clone()));
        }
        if let Some(ref ep) = endpoint {
            config_loader = config_loader.endpoint_url(ep);
        }
        let sdk_config = config_loader.load().await;

        // MinIO などのカスタムエンドポイントは path-style アクセスが必要
        let client = if endpoint.is_some() {
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build();
            aws_sdk_s3::Client::from_conf(s3_config)
        } else {
            aws_sdk_s3::Client::new(&sdk_config)
        };

        Ok(Self { client, bucket })
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put_object(&self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await?;
        Ok(())
    }

    async fn copy_object(&self, source_key: &str, target_key: &str) -> anyhow::Result<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, source_key))
            .key(target_key)
            .send()
            .await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn generate_download_url(
        &self,
        key: &str,
        expires_in_seconds: u32,
    ) -> anyhow::Result<String> {
        let presigning = PresigningConfig::expires_in(std::time::Duration::from_secs(
            expires_in_seconds as u64,
        ))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await?;

        Ok(presigned.uri().to_string())
    }

    async fn list_objects(&self) -> anyhow::Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                let last_modified = object
                    .last_modified()
                    .and_then(|lm| DateTime::from_timestamp(lm.secs(), lm.subsec_nanos()))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    last_modified,
                });
            }
        }
        Ok(objects)
    }
}
