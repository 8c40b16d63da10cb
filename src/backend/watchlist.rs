use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::tmdb::Movie;
use crate::config::app_config_dir;
use crate::error::Result;

/// Movies the user saved, most recently added last.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Watchlist {
    #[serde(default)]
    movies: Vec<Movie>,
    #[serde(skip)]
    path: PathBuf,
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

pub fn default_watchlist_path() -> PathBuf {
    app_config_dir().join("watchlist.json")
}

impl Watchlist {
    pub fn load() -> Self {
        Self::load_from(default_watchlist_path())
    }

    /// Reads the list at `path`. A missing file yields an empty list bound
    /// to the same path. A corrupt file is moved to `<path>.bak` first so
    /// the next save cannot overwrite it.
    pub fn load_from(path: PathBuf) -> Self {
        let mut watchlist = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                let backup = backup_path(&path);
                log::warn!(
                    "corrupt watchlist {} ({}), moving it to {}",
                    path.display(),
                    e,
                    backup.display()
                );
                if let Err(e) = fs::rename(&path, &backup) {
                    log::error!("failed to back up corrupt watchlist: {}", e);
                }
                Watchlist::default()
            }),
            Err(_) => Watchlist::default(),
        };
        watchlist.path = path;
        watchlist
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.movies.iter().any(|m| m.id == id)
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// Adds or removes `movie` and writes the file. Returns whether the movie
    /// is on the list afterwards.
    pub fn toggle(&mut self, movie: &Movie) -> bool {
        let added = if self.contains(movie.id) {
            self.movies.retain(|m| m.id != movie.id);
            false
        } else {
            self.movies.push(movie.clone());
            true
        };

        if let Err(e) = self.save() {
            log::error!("failed to save watchlist: {}", e);
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: u64, title: &str) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            year: None,
            overview: String::new(),
            rating: 6.5,
            poster_path: Some("/p.jpg".to_string()),
            backdrop_path: None,
        }
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let dir = tempfile::tempdir().unwrap();
        let mut watchlist = Watchlist::load_from(dir.path().join("watchlist.json"));
        assert!(watchlist.is_empty());

        let heat = movie(949, "Heat");
        assert!(watchlist.toggle(&heat));
        assert!(watchlist.contains(949));
        assert!(!watchlist.toggle(&heat));
        assert!(!watchlist.contains(949));
    }

    #[test]
    fn test_persists_between_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("watchlist.json");

        let mut watchlist = Watchlist::load_from(path.clone());
        watchlist.toggle(&movie(1, "Alien"));
        watchlist.toggle(&movie(2, "Aliens"));

        let reloaded = Watchlist::load_from(path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.movies()[0].title, "Alien");
        assert_eq!(reloaded.movies()[1].poster_path.as_deref(), Some("/p.jpg"));
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlist.json");
        fs::write(&path, "{ broken").unwrap();

        let mut watchlist = Watchlist::load_from(path.clone());
        assert!(watchlist.is_empty());
        assert_eq!(watchlist.path, path);

        let backup = dir.path().join("watchlist.json.bak");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{ broken");

        // saving the fresh list leaves the backup alone
        watchlist.toggle(&movie(7, "Se7en"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{ broken");
        assert_eq!(Watchlist::load_from(path).len(), 1);
    }
}
