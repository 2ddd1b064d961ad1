//! JSON-file backed news source.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::Source;
use crate::decode::decode_news_items;
use crate::model::NewsItem;

/// Serves news documents from a JSON file. The file is re-read on every
/// fetch so edits show up without a restart.
pub struct StaticFileSource {
    name: String,
    path: PathBuf,
}

impl StaticFileSource {
    pub fn new(name: &str, path: impl AsRef<Path>) -> Result<Self> {
        if name.is_empty() {
            bail!("static source requires a name");
        }
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            bail!("static source requires a path");
        }
        std::fs::metadata(path).with_context(|| format!("static source: {}", path.display()))?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl Source for StaticFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>> {
        if cancel.is_cancelled() {
            bail!("fetch cancelled");
        }

        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("read static file {}", self.path.display()))?;

        let items = decode_news_items(&raw)
            .with_context(|| format!("decode static file {}", self.path.display()))?;

        Ok(items
            .into_iter()
            .filter(|item| {
                let ts = item.published();
                ts >= from && ts <= to
            })
            .collect())
    }
}
