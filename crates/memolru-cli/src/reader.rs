//! Memoized JSON file reader

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use memolru::{Args, CacheConfig, CacheStats, Memo, Value};
use tracing::debug;

type ReadFn = fn(&Args) -> Result<Arc<serde_json::Value>>;

/// Reads JSON documents, serving repeated paths from an LRU cache
pub struct JsonReader {
    memo: Memo<ReadFn, Arc<serde_json::Value>>,
}

impl JsonReader {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let memo = Memo::with_config(read_json_file as ReadFn, config)?;
        Ok(Self { memo })
    }

    /// Parsed contents of `path`
    ///
    /// Paths that are not valid UTF-8 are rejected rather than lossily
    /// converted, so distinct paths never share a cache entry.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<Arc<serde_json::Value>> {
        self.memo.call(&path_args(path.as_ref())?)
    }

    /// Whether `path` is currently cached
    pub fn is_cached<P: AsRef<Path>>(&self, path: P) -> bool {
        path_args(path.as_ref())
            .and_then(|args| Ok(self.memo.contains_args(&args)?))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> &CacheStats {
        self.memo.stats()
    }

    pub fn cached(&self) -> usize {
        self.memo.size()
    }
}

fn path_args(path: &Path) -> Result<Args> {
    let path = path
        .to_str()
        .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", path.display()))?;
    Ok(Args::new().arg(path))
}

fn read_json_file(args: &Args) -> Result<Arc<serde_json::Value>> {
    let path = match args.args() {
        [Value::Str(path)] => path,
        other => anyhow::bail!("expected a single path argument, got {:?}", other),
    };
    debug!("Reading {}", path);

    let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {} as JSON", path))?;
    Ok(Arc::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_is_memoized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, r#"{"name": "a", "n": 1}"#).unwrap();

        let reader = JsonReader::new(CacheConfig::with_capacity(4)).unwrap();
        let first = reader.read(&path).unwrap();
        assert_eq!(first["name"], "a");

        // Served from cache even after the file changes on disk.
        fs::write(&path, r#"{"name": "changed"}"#).unwrap();
        let second = reader.read(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(reader.stats().hits(), 1);
        assert!(reader.is_cached(&path));
    }

    #[test]
    fn test_missing_file_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let reader = JsonReader::new(CacheConfig::with_capacity(4)).unwrap();
        let err = reader.read(&path).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
        assert_eq!(reader.cached(), 0);

        fs::write(&path, "[1, 2, 3]").unwrap();
        let value = reader.read(&path).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let reader = JsonReader::new(CacheConfig::with_capacity(4)).unwrap();
        let err = reader.read(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
        assert_eq!(reader.stats().failures(), 1);
    }

    #[test]
    fn test_eviction() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("{}.json", i));
                fs::write(&path, i.to_string()).unwrap();
                path
            })
            .collect();

        let reader = JsonReader::new(CacheConfig::with_capacity(2)).unwrap();
        for path in &paths {
            reader.read(path).unwrap();
        }

        assert!(!reader.is_cached(&paths[0]));
        assert!(reader.is_cached(&paths[1]));
        assert!(reader.is_cached(&paths[2]));
        assert_eq!(reader.stats().evictions(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let reader = JsonReader::new(CacheConfig::with_capacity(4)).unwrap();
        let first = Path::new(OsStr::from_bytes(b"/tmp/\xff.json"));
        let second = Path::new(OsStr::from_bytes(b"/tmp/\xfe.json"));

        let err = reader.read(first).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
        assert!(reader.read(second).is_err());
        assert!(!reader.is_cached(first));
        assert_eq!(reader.cached(), 0);
        assert_eq!(reader.stats().misses(), 0);
    }
}
