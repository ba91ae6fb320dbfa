use std::path::PathBuf;
use std::time::Duration;

use super::ExtractError;

#[derive(Debug)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,
    /// Only known for HTTP(S) fetches.
    pub content_type: Option<String>,
}

/// Reads upload blobs from `http(s)://` URLs, `file://` URLs or bare paths.
#[derive(Debug, Clone)]
pub struct BlobFetcher {
    client: reqwest::Client,
}

impl BlobFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractError::Fetch {
                url: String::new(),
                message: format!("HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedBlob, ExtractError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url).await
        } else {
            read_local(local_path(url)?).await
        }
    }

    async fn fetch_http(&self, url: &str) -> Result<FetchedBlob, ExtractError> {
        let fetch_error = |message: String| ExtractError::Fetch {
            url: crate::sanitize::redact_url(url),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        tracing::debug!(bytes = bytes.len(), content_type = ?content_type, "Fetched upload blob");

        Ok(FetchedBlob {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn local_path(url: &str) -> Result<PathBuf, ExtractError> {
    if url.starts_with("file://") {
        let parsed = reqwest::Url::parse(url).map_err(|e| ExtractError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        return parsed.to_file_path().map_err(|_| ExtractError::Fetch {
            url: url.to_string(),
            message: "not a local file URL".to_string(),
        });
    }
    Ok(PathBuf::from(url))
}

async fn read_local(path: PathBuf) -> Result<FetchedBlob, ExtractError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ExtractError::ReadFile { path, source: e })?;
    Ok(FetchedBlob {
        bytes,
        content_type: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_from_file_url() {
        let path = local_path("file:///srv/uploads/menu%20card.pdf").unwrap();
        assert_eq!(path, PathBuf::from("/srv/uploads/menu card.pdf"));
    }

    #[test]
    fn test_local_path_bare() {
        let path = local_path("/srv/uploads/menu.pdf").unwrap();
        assert_eq!(path, PathBuf::from("/srv/uploads/menu.pdf"));
    }

    #[tokio::test]
    async fn test_fetch_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.txt");
        std::fs::write(&path, "Olives 4.00").unwrap();

        let url = reqwest::Url::from_file_path(&path).unwrap();
        let blob = BlobFetcher::new(5).unwrap().fetch(url.as_str()).await.unwrap();

        assert_eq!(blob.bytes, b"Olives 4.00");
        assert!(blob.content_type.is_none());
    }
}
