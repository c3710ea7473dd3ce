//! Publishing dashboard documents to S3.

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use tracing::info;

use super::Dashboard;

pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Object key for a dashboard file, with `.gz` appended when compressed.
pub fn object_key(prefix: &str, file_name: &str, gzip: bool) -> String {
    let prefix = prefix.trim_matches('/');
    let key = if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    };
    if gzip { format!("{key}.gz") } else { key }
}

/// Uploads `dashboard` as JSON, optionally gzip-compressed.
#[tracing::instrument(skip(client, dashboard), fields(bucket, key, gzip))]
pub async fn write_dashboard_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    dashboard: &Dashboard,
    gzip: bool,
) -> Result<()> {
    let json = dashboard.to_json()?;
    let body = if gzip { self::gzip(&json)? } else { json };

    let mut request = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .content_type("application/json");
    if gzip {
        request = request.content_encoding("gzip");
    }
    request.send().await?;

    info!(clusters = dashboard.clusters.len(), "Dashboard uploaded");
    Ok(())
}
