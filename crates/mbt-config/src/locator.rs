// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Profile discovery on a search path.
//!
//! Profiles are `.json` files. A profile argument is either a path that
//! exists, or a bare file name matched case-insensitively against every
//! `.json` file in the search directories. When two directories hold the
//! same file name, the directory searched later wins.

use crate::error::{ConfigError, ConfigResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// A profile file found on the search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    /// Directory holding the file.
    pub dir: PathBuf,
    /// File name, extension included.
    pub file_name: String,
}

impl ProfileEntry {
    /// Full path of the profile.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Finds profile files on an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct ProfileLocator {
    paths: Vec<PathBuf>,
}

impl ProfileLocator {
    /// Creates a locator over exactly the given directories.
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut locator = Self::default();
        for path in paths {
            locator.push(path);
        }
        locator
    }

    /// Creates a locator with the standard search path.
    ///
    /// Order: the executable's directory, the current directory, the
    /// configured extra directories, then the directory of `profile` if it
    /// names one.
    pub fn standard(extra: &[PathBuf], profile: Option<&str>) -> Self {
        let mut locator = Self::default();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            locator.push(dir);
        }
        if let Ok(cwd) = std::env::current_dir() {
            locator.push(cwd);
        }
        for dir in extra {
            locator.push(dir.clone());
        }
        if let Some(dir) = profile
            .map(Path::new)
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
        {
            locator.push(dir.to_path_buf());
        }
        locator
    }

    fn push(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// The search directories in order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Lists every profile, one entry per file name.
    pub fn list(&self) -> Vec<ProfileEntry> {
        let mut entries: Vec<ProfileEntry> = Vec::new();
        for dir in &self.paths {
            let Ok(read_dir) = fs::read_dir(dir) else {
                trace!(dir = %dir.display(), "Skipping unreadable profile directory");
                continue;
            };
            let mut names: Vec<String> = read_dir
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|name| name.to_uppercase().ends_with(".JSON"))
                .collect();
            names.sort();

            for name in names {
                entries.retain(|e| e.file_name != name);
                entries.push(ProfileEntry {
                    dir: dir.clone(),
                    file_name: name,
                });
            }
        }
        entries
    }

    /// Resolves a profile argument to a file path.
    pub fn resolve(&self, profile: &str) -> ConfigResult<PathBuf> {
        let direct = Path::new(profile);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let wanted = profile.to_uppercase();
        let wanted_json = format!("{wanted}.JSON");
        let entries = self.list();
        entries
            .iter()
            .rev()
            .find(|e| {
                let name = e.file_name.to_uppercase();
                name == wanted || name == wanted_json
            })
            .map(ProfileEntry::path)
            .ok_or_else(|| ConfigError::profile_not_found(profile))
    }
}
