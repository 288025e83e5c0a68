use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use flate2::bufread::GzDecoder;
use tracing::{info, warn};

use crate::models::RepoSlug;
use crate::sources::RepoSource;

const COMPRESSED_FILENAME: &str = "reaper-dataset.csv.gz";
const DECOMPRESSED_FILENAME: &str = "reaper-dataset.csv";
const REPOSITORY_COLUMN: &str = "repository";

/// Row predicate for the RepoReaper dataset.
#[derive(Debug, Clone)]
pub enum ReaperFilter {
    /// Keep rows whose `stars` column is strictly greater than the
    /// given value.
    MinStars(u32),
    /// Keep rows whose named classifier flag column equals 1.
    ClassifierFlag(String),
}

/// Downloads the gzip-compressed RepoReaper CSV dataset, caches both
/// the compressed and decompressed forms on disk, and returns the
/// `repository` column of the rows passing the configured filter.
///
/// Both the download and the decompression are idempotent: each step
/// is skipped when its target file already exists.
pub struct ReaperSource {
    url: String,
    cache_dir: PathBuf,
    filter: ReaperFilter,
    client: reqwest::Client,
}

impl ReaperSource {
    pub fn new(url: impl Into<String>, cache_dir: PathBuf, filter: ReaperFilter) -> Self {
        Self {
            url: url.into(),
            cache_dir,
            filter,
            client: reqwest::Client::new(),
        }
    }

    async fn ensure_downloaded(&self, gz_path: &Path) -> Result<()> {
        if gz_path.exists() {
            info!(path = %gz_path.display(), "compressed dataset already cached");
            return Ok(());
        }
        info!(url = %self.url, "downloading dataset");
        let bytes = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("cannot download dataset {}", self.url))?
            .bytes()
            .await?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(gz_path, &bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl RepoSource for ReaperSource {
    async fn repo_slugs(&self) -> Result<Vec<RepoSlug>> {
        let gz_path = self.cache_dir.join(COMPRESSED_FILENAME);
        let csv_path = self.cache_dir.join(DECOMPRESSED_FILENAME);

        if !csv_path.exists() {
            self.ensure_downloaded(&gz_path).await?;
            decompress(&gz_path, &csv_path)?;
        } else {
            info!(path = %csv_path.display(), "decompressed dataset already cached");
        }

        let slugs = read_filtered(&csv_path, &self.filter)?;
        info!(count = slugs.len(), "filtered dataset rows");
        Ok(slugs)
    }
}

fn decompress(gz_path: &Path, csv_path: &Path) -> Result<()> {
    let input = File::open(gz_path)
        .with_context(|| format!("cannot open compressed dataset {}", gz_path.display()))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut output = BufWriter::new(File::create(csv_path)?);
    std::io::copy(&mut decoder, &mut output)
        .with_context(|| format!("cannot decompress {}", gz_path.display()))?;
    Ok(())
}

fn read_filtered(csv_path: &Path, filter: &ReaperFilter) -> Result<Vec<RepoSlug>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("cannot read dataset {}", csv_path.display()))?;

    let headers = reader.headers()?.clone();
    let repo_idx = column_index(&headers, REPOSITORY_COLUMN)?;
    let filter_idx = match filter {
        ReaperFilter::MinStars(_) => column_index(&headers, "stars")?,
        ReaperFilter::ClassifierFlag(column) => column_index(&headers, column)?,
    };

    let mut slugs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let value = record.get(filter_idx).unwrap_or_default();
        if !row_passes(filter, value) {
            continue;
        }
        let raw = record.get(repo_idx).unwrap_or_default();
        match RepoSlug::parse(raw) {
            Ok(slug) => slugs.push(slug),
            Err(e) => warn!("skipping dataset row: {e}"),
        }
    }
    Ok(slugs)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    match headers.iter().position(|h| h == name) {
        Some(idx) => Ok(idx),
        None => bail!("dataset has no {name:?} column"),
    }
}

fn row_passes(filter: &ReaperFilter, value: &str) -> bool {
    match filter {
        ReaperFilter::MinStars(min) => value
            .parse::<f64>()
            .map(|stars| stars > f64::from(*min))
            .unwrap_or(false),
        ReaperFilter::ClassifierFlag(_) => value.trim() == "1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(DECOMPRESSED_FILENAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn filters_by_star_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "repository,stars\nacme/popular,42\nacme/quiet,1\nacme/empty,0\n",
        );
        let slugs = read_filtered(&path, &ReaperFilter::MinStars(1)).unwrap();
        assert_eq!(slugs.len(), 1);
        assert_eq!(slugs[0].to_string(), "acme/popular");
    }

    #[test]
    fn filters_by_classifier_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "repository,unanimous\nacme/yes,1\nacme/no,0\n",
        );
        let filter = ReaperFilter::ClassifierFlag("unanimous".to_string());
        let slugs = read_filtered(&path, &filter).unwrap();
        assert_eq!(slugs.len(), 1);
        assert_eq!(slugs[0].to_string(), "acme/yes");
    }

    #[test]
    fn malformed_slug_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "repository,stars\nnot-a-slug,10\nacme/ok,10\n");
        let slugs = read_filtered(&path, &ReaperFilter::MinStars(1)).unwrap();
        assert_eq!(slugs.len(), 1);
    }

    #[test]
    fn missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "repository\nacme/ok\n");
        assert!(read_filtered(&path, &ReaperFilter::MinStars(1)).is_err());
    }

    #[test]
    fn decompression_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let gz_path = dir.path().join(COMPRESSED_FILENAME);
        let csv_path = dir.path().join(DECOMPRESSED_FILENAME);

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(b"repository,stars\nacme/popular,42\n")
            .unwrap();
        std::fs::write(&gz_path, encoder.finish().unwrap()).unwrap();

        decompress(&gz_path, &csv_path).unwrap();
        let slugs = read_filtered(&csv_path, &ReaperFilter::MinStars(1)).unwrap();
        assert_eq!(slugs.len(), 1);
    }

    #[tokio::test]
    async fn cached_csv_skips_download_and_decompress() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "repository,stars\nacme/popular,42\n");

        // Unreachable URL: if the cache were ignored this would fail.
        let source = ReaperSource::new(
            "http://127.0.0.1:1/unreachable.csv.gz",
            dir.path().to_path_buf(),
            ReaperFilter::MinStars(1),
        );
        let slugs = source.repo_slugs().await.unwrap();
        assert_eq!(slugs.len(), 1);
    }
}
