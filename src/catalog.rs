//! The work-item universe
//!
//! The catalog is fetched from the remote API once and cached in the state
//! directory, so later runs walk the same list without re-downloading it.
//! Plain id lists (one integer per line) drive backfills and record gaps.

use crate::client::ThrottledClient;
use crate::record::WorkItem;
use crate::{ConfigError, HarvestError, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of the cached catalog snapshot inside the state directory
pub const CATALOG_CACHE_FILE: &str = "app_list.json";

pub fn catalog_cache_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CATALOG_CACHE_FILE)
}

/// Loads the cached catalog, downloading and caching it on first use
pub async fn load_work_items(client: &mut ThrottledClient, state_dir: &Path) -> Result<Vec<WorkItem>> {
    let cache = catalog_cache_path(state_dir);

    if cache.exists() {
        tracing::info!("Loading catalog from cache: {}", cache.display());
        return read_catalog_cache(&cache);
    }

    tracing::warn!("Catalog cache not found; fetching it from the API (this happens only once)");
    let document = client.fetch_catalog().await?;
    let items = parse_catalog_document(document)?;
    write_catalog_cache(&cache, &items)?;
    tracing::info!("Fetched and cached {} work items", items.len());

    Ok(items)
}

/// Extracts `applist.apps` from the catalog endpoint's response
pub fn parse_catalog_document(mut document: Value) -> Result<Vec<WorkItem>> {
    let apps = document
        .pointer_mut("/applist/apps")
        .map(Value::take)
        .ok_or_else(|| HarvestError::Catalog("response has no applist.apps array".to_string()))?;

    serde_json::from_value(apps)
        .map_err(|e| HarvestError::Catalog(format!("invalid catalog entries: {}", e)))
}

pub fn read_catalog_cache(path: &Path) -> Result<Vec<WorkItem>> {
    let file = File::open(path)?;
    let items: Vec<WorkItem> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| HarvestError::Catalog(format!("corrupt cache {}: {}", path.display(), e)))?;
    Ok(items)
}

/// Writes the snapshot through a temporary file so a crash never leaves a
/// truncated cache behind
pub fn write_catalog_cache(path: &Path, items: &[WorkItem]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, items)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a human-curated id list: one integer per line, other lines ignored
pub fn read_id_list(path: &Path) -> Result<Vec<u64>> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut ids = Vec::new();
    for line in reader.lines() {
        if let Ok(id) = line?.trim().parse::<u64>() {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Writes ids in ascending order, one per line
pub fn write_id_list(path: &Path, ids: &BTreeSet<u64>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}
