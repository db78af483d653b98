use super::sigv4::{self, AwsCredentials, EMPTY_PAYLOAD_SHA256};
use super::ObjectStore;
use crate::error::StorageError;
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// S3 (or S3-compatible) REST backend signed with SigV4.
///
/// Without an explicit endpoint, requests use AWS virtual-hosted addressing
/// (`{bucket}.s3.{region}.amazonaws.com`). With one, path-style addressing is
/// used against that endpoint.
pub struct S3Store {
    client: Client,
    credentials: AwsCredentials,
    region: String,
    endpoint: Option<Url>,
}

/// Where a request for one object goes and what gets signed.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    host: String,
    canonical_uri: String,
    url: String,
}

impl S3Store {
    pub fn new(
        credentials: AwsCredentials,
        region: &str,
        endpoint: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let endpoint = endpoint
            .map(|e| Url::parse(e).map_err(|err| StorageError::Endpoint(format!("{}: {}", e, err))))
            .transpose()?;
        if let Some(ref url) = endpoint {
            if url.host_str().is_none() {
                return Err(StorageError::Endpoint(format!("{} has no host", url)));
            }
        }
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            credentials,
            region: region.to_string(),
            endpoint,
        })
    }

    fn target(&self, bucket: &str, key: &str) -> Target {
        let key = key.trim_start_matches('/');
        match &self.endpoint {
            Some(endpoint) => {
                let host = match (endpoint.host_str(), endpoint.port()) {
                    (Some(h), Some(p)) => format!("{}:{}", h, p),
                    (Some(h), None) => h.to_string(),
                    (None, _) => String::new(),
                };
                let canonical_uri = sigv4::uri_encode_path(&format!("/{}/{}", bucket, key));
                let url = format!("{}://{}{}", endpoint.scheme(), host, canonical_uri);
                Target { host, canonical_uri, url }
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", bucket, self.region);
                let canonical_uri = sigv4::uri_encode_path(&format!("/{}", key));
                let url = format!("https://{}{}", host, canonical_uri);
                Target { host, canonical_uri, url }
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response, StorageError> {
        let target = self.target(bucket, key);
        let payload_hash = match &body {
            Some(bytes) => sigv4::sha256_hex(bytes),
            None => EMPTY_PAYLOAD_SHA256.to_string(),
        };
        let amz_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        let mut signed = BTreeMap::new();
        signed.insert("host".to_string(), target.host.clone());
        signed.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        signed.insert("x-amz-date".to_string(), amz_date.clone());
        if let Some(ref token) = self.credentials.session_token {
            signed.insert("x-amz-security-token".to_string(), token.clone());
        }

        let authorization = sigv4::authorization(
            &self.credentials,
            &self.region,
            method.as_str(),
            &target.canonical_uri,
            &signed,
            &payload_hash,
            &amz_date,
        );

        let mut req = self.client.request(method, &target.url);
        for (k, v) in &signed {
            if k != "host" {
                req = req.header(k.as_str(), v.as_str());
            }
        }
        req = req.header("authorization", authorization);
        if let Some(bytes) = body {
            req = req.header("content-type", "application/json").body(bytes);
        }

        Ok(req.send().await?)
    }
}

async fn status_error(
    op: &'static str,
    bucket: &str,
    key: &str,
    resp: Response,
) -> StorageError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    StorageError::Status {
        op,
        bucket: bucket.to_string(),
        key: key.to_string(),
        status,
        body,
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let resp = self.send(Method::HEAD, bucket, key, None).await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error("HEAD", bucket, key, resp).await),
        }
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<(), StorageError> {
        let resp = self.send(Method::GET, bucket, key, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(status_error("GET", bucket, key, resp).await);
        }
        let bytes = resp.bytes().await?;
        tokio::fs::write(local_path, &bytes)
            .await
            .map_err(|e| StorageError::io(local_path, e))?;
        tracing::debug!(bucket, key, bytes = bytes.len(), "downloaded object");
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<(), StorageError> {
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::io(local_path, e))?;
        let len = body.len();
        let resp = self.send(Method::PUT, bucket, key, Some(body)).await?;
        if !resp.status().is_success() {
            return Err(status_error("PUT", bucket, key, resp).await);
        }
        tracing::debug!(bucket, key, bytes = len, "uploaded object");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let resp = self.send(Method::DELETE, bucket, key, None).await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(status_error("DELETE", bucket, key, resp).await)
    }
}
