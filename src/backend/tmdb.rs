use bytes::Bytes;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::cache::ResponseCache;
use crate::config::Config;
use crate::error::{CatalogError, Result};

const USER_AGENT: &str = concat!("watchlist-tui/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub year: Option<String>,
    pub overview: String,
    pub rating: f64,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

/// One page of a movie list, as returned by the list and search endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct MoviePage {
    pub page: u32,
    pub total_pages: u32,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MovieDetails {
    pub id: u64,
    pub tagline: Option<String>,
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub vote_count: u64,
    pub homepage: Option<String>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieListResponse {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    total_pages: Option<u32>,
    results: Vec<MovieData>,
}

#[derive(Debug, Deserialize)]
struct MovieData {
    id: u64,
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    backdrop_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsData {
    id: u64,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    vote_count: Option<u64>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

/// First four characters of a `YYYY-MM-DD` date, if there are that many.
pub fn release_year(date: Option<&str>) -> Option<String> {
    let date = date?;
    let year: String = date.chars().take(4).collect();
    (year.chars().count() == 4).then_some(year)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<MovieData> for Movie {
    fn from(m: MovieData) -> Self {
        Movie {
            id: m.id,
            title: m.title,
            year: release_year(m.release_date.as_deref()),
            overview: m.overview.unwrap_or_default(),
            rating: m.vote_average.unwrap_or_default(),
            poster_path: non_empty(m.poster_path),
            backdrop_path: non_empty(m.backdrop_path),
        }
    }
}

/// Parses a list body. A single malformed record fails the whole page.
pub fn parse_movie_page(body: &[u8]) -> Result<MoviePage> {
    let response: MovieListResponse = serde_json::from_slice(body)?;
    let page = response.page.unwrap_or(1);
    Ok(MoviePage {
        page,
        total_pages: response.total_pages.unwrap_or(page),
        movies: response.results.into_iter().map(Movie::from).collect(),
    })
}

pub fn parse_movie_details(body: &[u8]) -> Result<MovieDetails> {
    let d: DetailsData = serde_json::from_slice(body)?;
    Ok(MovieDetails {
        id: d.id,
        tagline: non_empty(d.tagline),
        runtime: d.runtime.filter(|r| *r > 0),
        genres: d.genres.into_iter().map(|g| g.name).collect(),
        vote_count: d.vote_count.unwrap_or_default(),
        homepage: non_empty(d.homepage),
        imdb_id: non_empty(d.imdb_id),
    })
}

pub fn movie_web_url(id: u64) -> String {
    format!("https://www.themoviedb.org/movie/{}", id)
}

#[derive(Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    config: Config,
    cache: ResponseCache,
}

impl TmdbClient {
    pub fn new(config: Config, cache: ResponseCache) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, config, cache })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        log::debug!("GET {}", redact(url));
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }

    /// Fetches one list page, answering from the response cache when possible.
    pub async fn fetch_movie_page(&self, url: &str) -> Result<MoviePage> {
        if let Some(body) = self.cache.get(url).await {
            log::debug!("cache hit for {}", redact(url));
            return parse_movie_page(&body);
        }

        let body = self.get_bytes(url).await?;
        let page = parse_movie_page(&body)?;
        self.cache.insert(url.to_string(), body).await;
        Ok(page)
    }

    pub async fn fetch_movie_details(&self, id: u64) -> Result<MovieDetails> {
        let url = format!(
            "{}/movie/{}?api_key={}&language={}",
            self.config.api_base_url, id, self.config.api_key, self.config.language
        );
        if let Some(body) = self.cache.get(&url).await {
            return parse_movie_details(&body);
        }

        let body = self.get_bytes(&url).await?;
        let details = parse_movie_details(&body)?;
        self.cache.insert(url, body).await;
        Ok(details)
    }

    /// Removes a cached list page so the next fetch goes to the network.
    pub async fn invalidate(&self, url: &str) {
        if self.cache.invalidate(url).await {
            log::debug!("invalidated {}", redact(url));
        }
    }

    pub async fn fetch_image(&self, url: &str) -> Option<DynamicImage> {
        if url.is_empty() {
            return None;
        }

        let bytes = match self.cache.get(url).await {
            Some(bytes) => bytes,
            None => {
                let bytes = match self.get_bytes(url).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::warn!("image download failed for {}: {}", url, e);
                        return None;
                    }
                };
                self.cache.insert_persistent(url.to_string(), bytes.clone()).await;
                bytes
            }
        };

        decode_image(&bytes)
    }
}

fn decode_image(bytes: &[u8]) -> Option<DynamicImage> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .decode()
        .ok()
}

/// Hides the api key when a URL goes to the log.
fn redact(url: &str) -> String {
    match url.find("api_key=") {
        Some(start) => {
            let value_start = start + "api_key=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|i| value_start + i)
                .unwrap_or(url.len());
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}
