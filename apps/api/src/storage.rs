use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::errors::AppError;

const RESUME_PREFIX: &str = "resumes/";

/// Location of an archived raw document. Recorded in draft provenance only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedDocument {
    pub path: String,
    pub url: String,
}

/// Uploads the raw bytes of a submitted document to object storage.
pub async fn archive_document(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    endpoint: &str,
    filename: &str,
    bytes: Bytes,
    content_type: Option<&str>,
) -> Result<ArchivedDocument, AppError> {
    let key = object_key(RESUME_PREFIX, Utc::now(), filename);

    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(bytes))
        .content_type(content_type.unwrap_or("application/octet-stream"))
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

    info!("Archived raw document to s3://{bucket}/{key}");

    Ok(ArchivedDocument {
        url: object_url(endpoint, bucket, &key),
        path: key,
    })
}

/// `<prefix><YYYYmmdd_HHMMSS>_<filename>`, with path separators in the
/// filename flattened.
fn object_key(prefix: &str, at: DateTime<Utc>, filename: &str) -> String {
    let name: String = filename
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let name = if name.is_empty() { "document".to_string() } else { name };
    format!("{prefix}{}_{name}", at.format("%Y%m%d_%H%M%S"))
}

fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_object_key_is_timestamped_and_flat() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            object_key("resumes/", at, "张三-简历.pdf"),
            "resumes/20240309_140507_张三-简历.pdf"
        );
        assert_eq!(
            object_key("resumes/", at, "../etc/passwd"),
            "resumes/20240309_140507_.._etc_passwd"
        );
        assert_eq!(object_key("resumes/", at, "  "), "resumes/20240309_140507_document");
    }

    #[test]
    fn test_object_url_is_path_style() {
        assert_eq!(
            object_url("http://localhost:9000/", "intake", "resumes/a.pdf"),
            "http://localhost:9000/intake/resumes/a.pdf"
        );
    }
}
