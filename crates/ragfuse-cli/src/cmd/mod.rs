pub mod aggregate;
pub mod config;
pub mod hybrid;

use anyhow::Context;
use ragfuse_core::config::resolve_config;
use ragfuse_core::{ErrorCode, ProjectConfig};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

/// Read a JSON document from `input`, where `-` means stdin.
pub fn read_json<T: DeserializeOwned>(input: &str) -> anyhow::Result<T> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))?
    };
    serde_json::from_str(&raw).context(ErrorCode::RequestParseError)
}

/// Effective file configuration for commands run in `project_root`.
pub fn load_config(project_root: &Path) -> anyhow::Result<ProjectConfig> {
    resolve_config(project_root).context(ErrorCode::ConfigParseError)
}
