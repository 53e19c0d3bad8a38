//! Chunked range downloads into a pre-sized local file
//!
//! Each chunk is an independent GET for an inclusive byte range, written at
//! its own offset. Callers partition ranges so they never overlap.

use crate::error::ArtifactError;
use crate::transport::{augmented_raise_for_status, HttpTransport, RequestOptions};
use artifactor_types::HttpMethod;
use reqwest::header::{HeaderMap, HeaderValue, RANGE};
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

/// Inclusive byte range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Split `[0, file_size)` into consecutive ranges of at most `chunk_size` bytes
pub fn plan_chunks(file_size: u64, chunk_size: u64) -> Vec<ByteRange> {
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < file_size {
        let end = start.saturating_add(chunk_size).min(file_size) - 1;
        ranges.push(ByteRange { start, end });
        start = end + 1;
    }
    ranges
}

/// Create (or truncate) `path` and extend it to `size` bytes
pub async fn presize_file(path: &Path, size: u64) -> Result<(), ArtifactError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    file.set_len(size).await?;
    Ok(())
}

/// Fetch `[range_start, range_end]` of `http_uri` and write it at
/// `range_start` in `download_path`, which must already exist.
pub async fn download_chunk(
    transport: &HttpTransport,
    range_start: u64,
    range_end: u64,
    headers: &HeaderMap,
    download_path: &Path,
    http_uri: &str,
) -> Result<(), ArtifactError> {
    let range = ByteRange {
        start: range_start,
        end: range_end,
    };
    let range_header = HeaderValue::from_str(&range.header_value())
        .map_err(|e| ArtifactError::InvalidArgument(e.to_string()))?;
    let options = RequestOptions::new()
        .headers(headers)
        .header(RANGE, range_header);

    let response = transport.send(HttpMethod::Get, http_uri, options).await?;
    let response = augmented_raise_for_status(response).await?;
    let body = response.bytes().await?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(download_path)
        .await?;
    file.seek(std::io::SeekFrom::Start(range_start)).await?;
    file.write_all(&body).await?;
    file.flush().await?;

    debug!(
        "Wrote {} bytes at offset {} of {}",
        body.len(),
        range_start,
        download_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_chunks_covers_file() {
        let ranges = plan_chunks(250, 100);
        assert_eq!(
            ranges,
            vec![
                ByteRange { start: 0, end: 99 },
                ByteRange { start: 100, end: 199 },
                ByteRange { start: 200, end: 249 },
            ]
        );
        assert_eq!(ranges.iter().map(ByteRange::len).sum::<u64>(), 250);
    }

    #[test]
    fn test_plan_chunks_edges() {
        assert!(plan_chunks(0, 100).is_empty());
        assert_eq!(plan_chunks(100, 100), vec![ByteRange { start: 0, end: 99 }]);
        assert_eq!(plan_chunks(3, 0).len(), 3);
    }

    #[test]
    fn test_range_header() {
        let range = ByteRange { start: 100, end: 199 };
        assert_eq!(range.header_value(), "bytes=100-199");
        assert_eq!(range.len(), 100);
    }

    #[tokio::test]
    async fn test_presize_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        presize_file(&path, 4096).await.unwrap();
        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 4096);
    }
}
