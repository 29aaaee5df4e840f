//! Seed data loading.
//!
//! Seed records come from a local file or an HTTP endpoint. Either source
//! holds a bare array of records or the stored `{"users": [...]}` shape.

use crate::domain::user::{User, UserPool};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Upper bound on the whole seed download.
pub const SEED_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch seed data from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("seed endpoint {url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("invalid seed data from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    List(Vec<User>),
    Pool(UserPool),
}

pub fn parse_seed(raw: &str) -> Result<Vec<User>, serde_json::Error> {
    Ok(match serde_json::from_str::<SeedFile>(raw)? {
        SeedFile::List(users) => users,
        SeedFile::Pool(pool) => pool.users,
    })
}

pub async fn load_seed_file(path: &Path) -> Result<Vec<User>, SeedError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    parse_seed(&raw).map_err(|source| SeedError::Parse {
        origin: path.display().to_string(),
        source,
    })
}

/// Download seed records with a GET. Any 2xx body is parsed like a seed file.
pub async fn fetch_seed_url(url: &str) -> Result<Vec<User>, SeedError> {
    let http_error = |source| SeedError::Http {
        url: url.to_string(),
        source,
    };

    let client = Client::builder()
        .timeout(SEED_FETCH_TIMEOUT)
        .build()
        .map_err(http_error)?;

    let response = client.get(url).send().await.map_err(http_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SeedError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let raw = response.text().await.map_err(http_error)?;
    debug!(url = url, bytes = raw.len(), "Seed data downloaded");

    parse_seed(&raw).map_err(|source| SeedError::Parse {
        origin: url.to_string(),
        source,
    })
}
