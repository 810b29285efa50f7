//! File helpers shared by the JSON/JSONL backed stores.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub(crate) async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Read a JSON document, `None` if the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Write a JSON document through a temp file and rename, so readers never
/// observe a half-written file.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    replace_file(path, content.as_bytes()).await
}

/// Read every non-blank line. A line that does not parse fails the whole
/// read, naming the line.
pub(crate) async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
    };

    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut items = Vec::new();
    let mut number = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read line")? {
        number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let item: T = serde_json::from_str(&line).with_context(|| {
            format!("Failed to parse line {number} of {}: {line}", path.display())
        })?;
        items.push(item);
    }

    Ok(items)
}

/// Append lines and fsync before returning.
pub(crate) async fn append_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    ensure_parent(path).await?;

    let mut content = String::new();
    for item in items {
        content.push_str(&serde_json::to_string(item).context("Failed to serialize item")?);
        content.push('\n');
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {} for append", path.display()))?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", path.display()))?;

    Ok(())
}

/// Rewrite a JSONL file with exactly `items`.
pub(crate) async fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut content = String::new();
    for item in items {
        content.push_str(&serde_json::to_string(item).context("Failed to serialize item")?);
        content.push('\n');
    }
    replace_file(path, content.as_bytes()).await
}

async fn replace_file(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent(path).await?;

    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp)
        .await
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
