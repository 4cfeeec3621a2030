use std::fs;
use std::path::Path;
use std::sync::Arc;

use fps_core::{init_psl, GlobalSets, PslRules};
use fps_service::{FilePersistence, FirstPartySetsHandler, HandlerConfig, InMemorySitesToClearStore};
use serde_json::Value;
use tokio::runtime::Runtime;

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}

pub fn read_json(path: &Path) -> Result<Value, String> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JSON in '{}': {}", path.display(), e))
}

/// Install the list at `path` as the process-wide public suffix list.
pub fn load_psl(path: &Path) -> Result<(), String> {
    let bytes = read_bytes(path)?;
    let rules = PslRules::parse(&String::from_utf8_lossy(&bytes))
        .map_err(|e| format!("Invalid public suffix list '{}': {}", path.display(), e))?;
    init_psl(rules);
    Ok(())
}

pub fn new_runtime() -> Result<Runtime, String> {
    Runtime::new().map_err(|e| format!("Failed to start tokio runtime: {}", e))
}

pub fn build_handler(manual_set: Option<&str>, persisted: Option<&Path>) -> FirstPartySetsHandler {
    let config = HandlerConfig {
        manual_set: manual_set.map(str::to_string),
        persisted_sets_path: persisted.map(Path::to_path_buf),
        ..HandlerConfig::default()
    };
    FirstPartySetsHandler::new(config, Arc::new(FilePersistence), Arc::new(InMemorySitesToClearStore::new()))
}

/// Feed the sets file at `input` to `handler` and wait for the finalized sets.
pub async fn load_sets(handler: &FirstPartySetsHandler, input: &Path) -> Result<GlobalSets, String> {
    let bytes = read_bytes(input)?;
    handler.init().await;
    handler.set_public_first_party_sets(bytes).await;
    Ok(handler.wait_for_sets().await)
}
