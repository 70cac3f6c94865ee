// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Accepted-terms record
//!
//! One hyphenated user id per line, appended when a user accepts.
//! Lines that do not parse are skipped on load.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::host::UserId;

pub struct AgreementStore {
    path: PathBuf,
    users: HashSet<UserId>,
}

impl AgreementStore {
    /// Load the record; a missing file is an empty record
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut users = HashSet::new();

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    match line.parse::<UserId>() {
                        Ok(user) => {
                            users.insert(user);
                        }
                        Err(_) => {
                            tracing::debug!(target: "mineagent.chat.engine", %line, "skipping malformed agreement line");
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(target: "mineagent.chat.engine", count = users.len(), path = %path.display(), "agreement record loaded");
        Ok(Self { path, users })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.users.contains(&user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Record an acceptance. Returns false if the user was already recorded.
    pub fn record(&mut self, user: UserId) -> Result<bool> {
        if self.users.contains(&user) {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", user)?;

        self.users.insert(user);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = AgreementStore::load(dir.path().join("agreed_users.txt")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_record_appends_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("agreed_users.txt");
        let user = UserId::new();

        let mut store = AgreementStore::load(&path).unwrap();
        assert!(store.record(user).unwrap());
        assert!(!store.record(user).unwrap());

        let reloaded = AgreementStore::load(&path).unwrap();
        assert!(reloaded.contains(user));
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agreed_users.txt");
        let user = UserId::new();
        std::fs::write(&path, format!("garbage\n\n{}\nalso-bad\n", user)).unwrap();

        let store = AgreementStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(user));
    }
}
