//! Board snapshot files
//!
//! The CLI reads a board snapshot from a JSON file and, when asked, writes
//! the result back. Writes go to a temp file first and are renamed into place.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::{BoardSnapshot, RemoteBoard};

pub fn load_board(path: &Path) -> Result<BoardSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read board file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse board file: {}", path.display()))
}

pub fn load_payload(path: &Path) -> Result<RemoteBoard> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse payload: {}", path.display()))
}

/// Writes a snapshot as pretty JSON (full rewrite)
pub fn save_board(path: &Path, snapshot: &BoardSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let temp_path = path.with_extension("json.tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize board")?;
        writeln!(file, "{}", json).context("Failed to write board")?;
        file.flush().context("Failed to flush board file")?;
    }

    // Atomic rename
    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
