use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::pager::PagerSnapshot;
use crate::config::app_cache_dir;
use crate::error::Result;

/// List state saved on exit so the next run opens where this one stopped.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    #[serde(default)]
    pub active_tab: usize,
    #[serde(default)]
    pub lists: HashMap<String, PagerSnapshot>,
}

pub fn default_session_path() -> PathBuf {
    app_cache_dir().join("session.json")
}

impl Session {
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("discarding unreadable session {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Hands out the saved list for `key`, removing it from the session.
    pub fn take(&mut self, key: &str) -> Option<PagerSnapshot> {
        self.lists.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tmdb::Movie;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = Session {
            active_tab: 2,
            ..Session::default()
        };
        session.lists.insert(
            "popular".to_string(),
            PagerSnapshot {
                movies: vec![Movie {
                    id: 27205,
                    title: "Inception".to_string(),
                    year: Some("2010".to_string()),
                    overview: "Cobb steals secrets.".to_string(),
                    rating: 8.4,
                    poster_path: None,
                    backdrop_path: Some("/b.jpg".to_string()),
                }],
                next_page: 2,
                exhausted: false,
                selected: 0,
            },
        );
        session.save(&path).unwrap();

        let mut loaded = Session::load(&path).unwrap();
        assert_eq!(loaded, session);
        assert!(loaded.take("popular").is_some());
        assert!(loaded.take("popular").is_none());
    }

    #[test]
    fn test_missing_or_corrupt_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert!(Session::load(&path).is_none());

        fs::write(&path, "[]").unwrap();
        assert!(Session::load(&path).is_none());
    }
}
