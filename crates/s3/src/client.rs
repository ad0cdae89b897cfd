//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from s3up-core.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    Delete, ObjectCannedAcl, ObjectIdentifier, ServerSideEncryption, StorageClass,
};
use aws_smithy_types::error::display::DisplayErrorContext;

use s3up_core::{Connection, Error, ObjectInfo, ObjectStore, PutOptions, Result};

/// Most keys a single DeleteObjects request accepts
const DELETE_BATCH_SIZE: usize = 1000;

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client for the given connection
    ///
    /// Static credentials are used when both keys are configured; otherwise
    /// the SDK default provider chain applies (environment, profile, IMDS).
    pub async fn new(connection: &Connection) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(connection.region.clone()));

        if let Some((access_key, secret_key)) = connection.static_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "s3up-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &connection.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(connection.path_style)
            .build();

        tracing::debug!(
            region = %connection.region,
            endpoint = ?connection.endpoint,
            path_style = connection.path_style,
            "Created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

}

/// Keys are resolved `/`-rooted; the stored object name has no leading `/`
fn object_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

fn sdk_error<E: std::error::Error>(err: E, subject: &str) -> Error {
    classify(DisplayErrorContext(err).to_string(), subject)
}

fn classify(message: String, subject: &str) -> Error {
    if message.contains("NoSuchBucket") {
        Error::BucketNotFound(subject.to_string())
    } else if message.contains("NoSuchKey") || message.contains("NotFound") {
        Error::NotFound(subject.to_string())
    } else if ["AccessDenied", "InvalidAccessKeyId", "SignatureDoesNotMatch"]
        .iter()
        .any(|code| message.contains(code))
    {
        Error::Auth(message)
    } else {
        Error::Network(message)
    }
}

/// Error for the keys a DeleteObjects response reported as not deleted
///
/// `failures` holds `(key, error code)` pairs.
fn partial_delete_error(bucket: &str, failures: &[(String, String)]) -> Error {
    let listed = failures
        .iter()
        .map(|(key, code)| format!("{key} ({code})"))
        .collect::<Vec<_>>()
        .join(", ");
    let message = format!(
        "Failed to delete {} object(s) from '{bucket}': {listed}",
        failures.len()
    );

    if failures.iter().any(|(_, code)| code == "AccessDenied") {
        Error::Auth(message)
    } else {
        Error::Network(message)
    }
}

fn timestamp(value: &aws_sdk_s3::primitives::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(value.secs()).ok()
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error(e, "buckets"))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| {
                let mut info = ObjectInfo::bucket(b.name().unwrap_or_default());
                info.last_modified = b.creation_date().and_then(timestamp);
                info
            })
            .collect();

        Ok(buckets)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<ObjectInfo> {
        let key = object_key(key);
        let size = body.len() as i64;

        let mut request = self
            .inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(&options.content_type);

        if let Some(encoding) = &options.content_encoding {
            request = request.content_encoding(encoding);
        }
        if let Some(cache_control) = &options.cache_control {
            request = request.cache_control(cache_control);
        }
        if let Some(acl) = &options.acl {
            request = request.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if let Some(sse) = &options.server_side_encryption {
            request = request.server_side_encryption(ServerSideEncryption::from(sse.as_str()));
        }
        if let Some(class) = &options.storage_class {
            request = request.storage_class(StorageClass::from(class.as_str()));
        }
        if !options.metadata.is_empty() {
            let metadata: HashMap<String, String> = options
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            request = request.set_metadata(Some(metadata));
        }

        let response = request
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("{bucket}/{key}")))?;

        let mut info = ObjectInfo::file(key, size);
        if let Some(etag) = response.e_tag() {
            info.etag = Some(etag.trim_matches('"').to_string());
        }
        info.last_modified = Some(jiff::Timestamp::now());

        Ok(info)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let key = object_key(key);
        let subject = format!("{bucket}/{key}");

        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(e, &subject))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| sdk_error(e, &subject))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut items = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.inner.list_objects_v2().bucket(bucket);
            if !prefix.is_empty() {
                request = request.prefix(prefix);
            }
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| sdk_error(e, bucket))?;

            for object in response.contents() {
                let mut info =
                    ObjectInfo::file(object.key().unwrap_or_default(), object.size().unwrap_or(0));
                info.last_modified = object.last_modified().and_then(timestamp);
                if let Some(etag) = object.e_tag() {
                    info.etag = Some(etag.trim_matches('"').to_string());
                }
                items.push(info);
            }

            continuation_token = response.next_continuation_token().map(str::to_string);
            if !response.is_truncated().unwrap_or(false) || continuation_token.is_none() {
                break;
            }
        }

        tracing::debug!(bucket, prefix, count = items.len(), "Listed objects");
        Ok(items)
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<Vec<String>> {
        let mut deleted = Vec::with_capacity(keys.len());

        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = batch
                .iter()
                .map(|k| {
                    ObjectIdentifier::builder()
                        .key(object_key(k))
                        .build()
                        .map_err(|e| Error::General(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .build()
                .map_err(|e| Error::General(e.to_string()))?;

            let response = self
                .inner
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| sdk_error(e, bucket))?;

            deleted.extend(
                response
                    .deleted()
                    .iter()
                    .filter_map(|d| d.key().map(str::to_string)),
            );

            if !response.errors().is_empty() {
                let failures: Vec<(String, String)> = response
                    .errors()
                    .iter()
                    .map(|e| {
                        (
                            e.key().unwrap_or_default().to_string(),
                            e.code().unwrap_or("Unknown").to_string(),
                        )
                    })
                    .collect();
                tracing::error!(bucket, deleted = deleted.len(), "Failed to delete some objects");
                return Err(partial_delete_error(bucket, &failures));
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_drops_leading_slash() {
        assert_eq!(object_key("/site/index.html"), "site/index.html");
        assert_eq!(object_key("site/index.html"), "site/index.html");
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify("service error: NoSuchKey: missing".into(), "b/k"),
            Error::NotFound(ref s) if s == "b/k"
        ));
        assert!(matches!(
            classify("NoSuchBucket".into(), "b"),
            Error::BucketNotFound(_)
        ));
        assert!(matches!(
            classify("AccessDenied: nope".into(), "b"),
            Error::Auth(_)
        ));
        assert!(matches!(
            classify("dispatch failure: connection refused".into(), "b"),
            Error::Network(_)
        ));
    }

    #[test]
    fn test_partial_delete_error() {
        let failures = vec![
            ("site/a.html".to_string(), "InternalError".to_string()),
            ("site/b.html".to_string(), "SlowDown".to_string()),
        ];
        let err = partial_delete_error("artifacts", &failures);
        assert!(matches!(err, Error::Network(_)));
        let message = err.to_string();
        assert!(message.contains("2 object(s)"));
        assert!(message.contains("site/a.html (InternalError)"));
        assert!(message.contains("site/b.html (SlowDown)"));

        let denied = vec![("site/c.html".to_string(), "AccessDenied".to_string())];
        assert!(matches!(
            partial_delete_error("artifacts", &denied),
            Error::Auth(_)
        ));
    }

    #[test]
    fn test_sdk_error_uses_full_context() {
        let err = std::io::Error::other("InvalidAccessKeyId");
        assert!(matches!(sdk_error(err, "b"), Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_new_with_static_credentials() {
        let connection = Connection {
            endpoint: Some("http://localhost:9000".into()),
            region: "us-east-1".into(),
            access_key: Some("minioadmin".into()),
            secret_key: Some("minioadmin".into()),
            path_style: true,
        };
        assert!(S3Client::new(&connection).await.is_ok());
    }
}
