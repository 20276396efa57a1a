use cpm_agente::{
    bridge::{ConversationTurn, QueryBridge},
    config::{BridgeConfig, ProcessConfig},
    transport::Transport,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Bridge configuration with the production defaults and the given deadline.
pub fn bridge_config(timeout_secs: u64) -> BridgeConfig {
    BridgeConfig {
        timeout_secs,
        ..BridgeConfig::default()
    }
}

pub fn create_bridge(transport: impl Transport + 'static) -> QueryBridge {
    QueryBridge::new(Arc::new(transport), &BridgeConfig::default())
}

/// Create a temporary directory for test scripts
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Writes a shell script standing in for the retrieval script.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    path
}

/// Process configuration that runs `script` through `sh`.
pub fn sh_process_config(script: PathBuf) -> ProcessConfig {
    ProcessConfig {
        script_path: script,
        interpreter: Some("sh".to_string()),
        env: HashMap::new(),
    }
}

/// Alternating user/assistant turns numbered from zero.
pub fn create_turns(count: usize) -> Vec<ConversationTurn> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                ConversationTurn::user(format!("pergunta {}", i))
            } else {
                ConversationTurn::assistant(format!("resposta {}", i))
            }
        })
        .collect()
}
