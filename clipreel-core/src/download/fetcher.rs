use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::error::{DownloadError, DownloadResult};

/// Writes the body behind a media URL to a local file. Returns bytes written.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_to_file(&self, url: &str, path: &Path) -> DownloadResult<u64>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn copy_local(&self, url: &Url, path: &Path) -> DownloadResult<u64> {
        let source = url
            .to_file_path()
            .map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
        fs::copy(&source, path)
            .await
            .map_err(|source| DownloadError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch_to_file(&self, url: &str, path: &Path) -> DownloadResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
        if parsed.scheme() == "file" {
            return self.copy_local(&parsed, path).await;
        }
        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let mut stream = response.bytes_stream();
        let mut file = fs::File::create(path)
            .await
            .map_err(|source| DownloadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let data = chunk?;
            file.write_all(&data)
                .await
                .map_err(|source| DownloadError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            written += data.len() as u64;
        }
        file.flush().await.map_err(|source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn copies_file_urls() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.mp4");
        std::fs::write(&source, b"MEDIA").unwrap();
        let url = Url::from_file_path(&source).unwrap();

        let target = dir.path().join("run").join("clip.mp4");
        let fetcher = HttpFetcher::new(Client::new());
        let written = fetcher
            .fetch_to_file(url.as_str(), &target)
            .await
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&target).unwrap(), b"MEDIA");
    }

    #[tokio::test]
    async fn missing_local_source_is_io_error() {
        let dir = tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("absent.mp4")).unwrap();
        let fetcher = HttpFetcher::new(Client::new());
        let err = fetcher
            .fetch_to_file(url.as_str(), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Io { .. }));
    }

    #[tokio::test]
    async fn garbage_url_is_rejected() {
        let dir = tempdir().unwrap();
        let fetcher = HttpFetcher::new(Client::new());
        let err = fetcher
            .fetch_to_file("::nope::", &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }
}
