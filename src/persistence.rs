//! The peer log: a deduplicated, persisted list of `"host:port"`
//! strings observed over the node's lifetime. The chain snapshot itself
//! is owned and persisted by `ledger_core::Ledger`.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{NodeError, Result};

/// Loads the peer log, returning an empty set if the file does not
/// exist yet.
pub fn load_peer_log(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let bytes =
        std::fs::read(path).map_err(|e| NodeError::Persistence(format!("reading peer log: {e}")))?;
    let peers: Vec<String> = serde_json::from_slice(&bytes)
        .map_err(|e| NodeError::Persistence(format!("parsing peer log: {e}")))?;
    Ok(peers.into_iter().collect())
}

/// Overwrites the peer log with the current set, sorted for a stable
/// on-disk representation.
pub fn save_peer_log(path: &Path, peers: &HashSet<String>) -> Result<()> {
    let mut sorted: Vec<&String> = peers.iter().collect();
    sorted.sort();
    let bytes = serde_json::to_vec_pretty(&sorted)
        .map_err(|e| NodeError::Persistence(format!("serializing peer log: {e}")))?;
    std::fs::write(path, bytes)
        .map_err(|e| NodeError::Persistence(format!("writing peer log: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn missing_file_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        assert!(load_peer_log(&path).unwrap().is_empty());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        let mut peers = HashSet::new();
        peers.insert("127.0.0.1:5001".to_string());
        peers.insert("example.com:5002".to_string());

        save_peer_log(&path, &peers).unwrap();
        let loaded = load_peer_log(&path).unwrap();
        assert_eq!(loaded, peers);
    }
}
