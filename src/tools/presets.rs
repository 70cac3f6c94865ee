// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Preset files served by `#get`

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Read-only access to a namespace of preset documents
#[async_trait]
pub trait PresetSource: Send + Sync {
    /// Read a preset by name. `Ok(None)` means it does not exist.
    async fn read(&self, name: &str) -> Result<Option<String>>;

    /// Names offered to the agent in its system prompt
    fn index(&self) -> Vec<String>;
}

/// Presets stored as files in one directory
#[derive(Debug, Clone)]
pub struct PresetDirectory {
    root: PathBuf,
}

impl PresetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a name inside the directory, refusing anything that could
    /// escape it.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if name.is_empty()
            || name.contains(['/', '\\'])
            || name.contains("..")
            || Path::new(name).is_absolute()
        {
            return None;
        }
        Some(self.root.join(name))
    }
}

#[async_trait]
impl PresetSource for PresetDirectory {
    async fn read(&self, name: &str) -> Result<Option<String>> {
        let Some(path) = self.resolve(name) else {
            tracing::debug!(target: "mineagent.tools", %name, "rejected preset name");
            return Ok(None);
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content.lines().collect::<Vec<_>>().join("\n"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn index(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn presets() -> (TempDir, PresetDirectory) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("rules.txt"), "no griefing\r\nbe nice\n").unwrap();
        std::fs::write(dir.path().join("build.txt"), "use oak").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        let presets = PresetDirectory::new(dir.path());
        (dir, presets)
    }

    #[tokio::test]
    async fn test_read_existing() {
        let (_dir, presets) = presets();
        let content = presets.read("rules.txt").await.unwrap();
        assert_eq!(content.as_deref(), Some("no griefing\nbe nice"));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let (_dir, presets) = presets();
        assert!(presets.read("nope.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_escapes() {
        let (_dir, presets) = presets();
        for name in ["", "../secret", "a/b.txt", "/etc/passwd", "..", "a\\b"] {
            assert!(presets.read(name).await.unwrap().is_none(), "{name}");
        }
    }

    #[test]
    fn test_index_lists_txt_sorted() {
        let (_dir, presets) = presets();
        assert_eq!(presets.index(), vec!["build.txt", "rules.txt"]);
    }

    #[test]
    fn test_index_missing_dir_is_empty() {
        let presets = PresetDirectory::new("/definitely/not/here");
        assert!(presets.index().is_empty());
    }
}
