//! `ragfuse config`: show the effective configuration.

use crate::output::{OutputMode, pretty_section, render_mode};
use anyhow::Context;
use std::path::Path;

use super::load_config;

/// Execute `ragfuse config`.
///
/// Text mode prints TOML that can be pasted into `.ragfuse/config.toml`.
///
/// # Errors
///
/// Returns an error if a config file cannot be read, parsed, or validated.
pub fn run_config(output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let config = load_config(project_root)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render config as TOML")?;

    render_mode(
        output,
        &config,
        |_, w| write!(w, "{rendered}"),
        |_, w| {
            pretty_section(w, "Effective configuration")?;
            write!(w, "{rendered}")
        },
    )
}
