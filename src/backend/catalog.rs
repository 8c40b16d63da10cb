use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Page cap: lists stop before requesting this page.
pub const TOTAL_PAGES: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Popular,
    TopRated,
    Upcoming,
    NowPlaying,
    Search(String),
}

impl Section {
    /// The browsable sections, in tab order.
    pub const CATALOG: [Section; 4] = [
        Section::Popular,
        Section::TopRated,
        Section::Upcoming,
        Section::NowPlaying,
    ];

    pub fn title(&self) -> &str {
        match self {
            Section::Popular => "Popular",
            Section::TopRated => "Top Rated",
            Section::Upcoming => "Upcoming",
            Section::NowPlaying => "Now Playing",
            Section::Search(_) => "Search",
        }
    }

    /// Key used when persisting list state between runs. Search results are
    /// never persisted.
    pub fn session_key(&self) -> Option<&'static str> {
        match self {
            Section::Popular => Some("popular"),
            Section::TopRated => Some("top_rated"),
            Section::Upcoming => Some("upcoming"),
            Section::NowPlaying => Some("now_playing"),
            Section::Search(_) => None,
        }
    }

    pub fn url_for_page(&self, config: &Config, page: u32) -> String {
        let base = &config.api_base_url;
        let common = format!(
            "api_key={}&language={}&page={}",
            config.api_key, config.language, page
        );
        match self {
            Section::Popular => format!("{}/movie/popular?{}", base, common),
            Section::TopRated => format!("{}/movie/top_rated?{}", base, common),
            Section::Upcoming => format!("{}/movie/upcoming?{}", base, common),
            Section::NowPlaying => format!("{}/movie/now_playing?{}", base, common),
            Section::Search(query) => format!(
                "{}/search/movie?{}&query={}",
                base,
                common,
                urlencoding::encode(query)
            ),
        }
    }
}
