//! Paginated list controller shared by every catalog screen.
//!
//! The controller never performs I/O. It hands out [`PageRequest`] tickets,
//! and the caller fetches the page and reports back with
//! [`Pager::apply_page`] or [`Pager::fail`]. A ticket whose generation is
//! older than the pager's current one is ignored, which covers responses
//! that arrive after a refresh or retry.

use serde::{Deserialize, Serialize};

use super::catalog::TOTAL_PAGES;
use super::tmdb::{Movie, MoviePage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    /// First page in flight, nothing to show yet.
    #[default]
    Loading,
    Content,
    Error,
    /// A fetch is in flight while content stays on screen.
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub page: u32,
}

/// What survives a restart: the list, where to continue, and the cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagerSnapshot {
    pub movies: Vec<Movie>,
    pub next_page: u32,
    pub exhausted: bool,
    pub selected: usize,
}

#[derive(Debug)]
pub struct Pager {
    movies: Vec<Movie>,
    next_page: u32,
    last_page: u32,
    loading: bool,
    exhausted: bool,
    generation: u64,
    state: ViewState,
    pub selected: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager {
    pub fn new() -> Self {
        Self {
            movies: Vec::new(),
            next_page: 1,
            last_page: TOTAL_PAGES,
            loading: false,
            exhausted: false,
            generation: 0,
            state: ViewState::Loading,
            selected: 0,
        }
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// True before the first page was ever requested or restored.
    pub fn is_pristine(&self) -> bool {
        self.movies.is_empty() && !self.loading && self.state == ViewState::Loading
    }

    /// Drops everything and goes back to the pristine state. Any fetch still
    /// in flight becomes stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.movies.clear();
        self.selected = 0;
        self.next_page = 1;
        self.last_page = TOTAL_PAGES;
        self.loading = false;
        self.exhausted = false;
        self.state = ViewState::Loading;
    }

    /// Initial fetch of page 1.
    pub fn start(&mut self) -> PageRequest {
        self.reset(ViewState::Loading)
    }

    /// Pull-to-refresh. Existing movies stay visible until page 1 arrives.
    pub fn refresh(&mut self) -> PageRequest {
        let state = if self.movies.is_empty() {
            ViewState::Loading
        } else {
            ViewState::Refreshing
        };
        self.reset(state)
    }

    /// "Try again" from the error screen.
    pub fn retry(&mut self) -> PageRequest {
        self.reset(ViewState::Loading)
    }

    fn reset(&mut self, state: ViewState) -> PageRequest {
        self.generation += 1;
        self.next_page = 1;
        self.last_page = TOTAL_PAGES;
        self.exhausted = false;
        self.loading = true;
        self.state = state;
        PageRequest {
            generation: self.generation,
            page: 1,
        }
    }

    /// Infinite scroll trigger: the last loaded movie is fully visible and
    /// nothing is in flight.
    pub fn wants_next_page(&self, last_visible: Option<usize>) -> bool {
        let Some(last_visible) = last_visible else {
            return false;
        };
        !self.movies.is_empty()
            && last_visible + 1 >= self.movies.len()
            && !self.loading
            && !self.exhausted
            && self.state == ViewState::Content
    }

    /// Hands out the ticket for the next page, or `None` when a fetch is
    /// already in flight or the list is exhausted.
    pub fn begin_next_page(&mut self) -> Option<PageRequest> {
        if self.loading || self.exhausted {
            return None;
        }
        if self.past_end() {
            self.exhausted = true;
            return None;
        }
        self.loading = true;
        if !self.movies.is_empty() {
            self.state = ViewState::Refreshing;
        }
        Some(PageRequest {
            generation: self.generation,
            page: self.next_page,
        })
    }

    /// Appends a fetched page. Page 1 replaces the list. Returns false when
    /// the ticket is stale and the page was dropped.
    pub fn apply_page(&mut self, request: PageRequest, page: MoviePage) -> bool {
        if request.generation != self.generation || !self.loading {
            log::debug!(
                "dropping stale page {} (generation {} != {})",
                request.page,
                request.generation,
                self.generation
            );
            return false;
        }

        if page.page != request.page {
            log::debug!("asked for page {}, server sent page {}", request.page, page.page);
        }

        if request.page == 1 {
            self.movies.clear();
            self.selected = 0;
        }

        let received = page.movies.len();
        self.movies.extend(page.movies);
        self.next_page = request.page + 1;
        self.last_page = page.total_pages.clamp(1, TOTAL_PAGES);
        self.exhausted = received == 0 || self.past_end();
        self.loading = false;
        self.state = ViewState::Content;
        true
    }

    /// Reports a failed fetch. The list is cleared and the error screen shown.
    pub fn fail(&mut self, request: PageRequest) -> bool {
        if request.generation != self.generation || !self.loading {
            return false;
        }
        self.movies.clear();
        self.selected = 0;
        self.loading = false;
        self.state = ViewState::Error;
        true
    }

    /// Past the server's last page, or at the hard cap. Page `TOTAL_PAGES`
    /// itself is never requested.
    fn past_end(&self) -> bool {
        self.next_page > self.last_page || self.next_page >= TOTAL_PAGES
    }

    pub fn snapshot(&self) -> Option<PagerSnapshot> {
        if self.movies.is_empty() || self.state == ViewState::Error {
            return None;
        }
        Some(PagerSnapshot {
            movies: self.movies.clone(),
            next_page: self.next_page,
            exhausted: self.exhausted,
            selected: self.selected,
        })
    }

    pub fn restore(&mut self, snapshot: PagerSnapshot) {
        if snapshot.movies.is_empty() {
            return;
        }
        self.generation += 1;
        self.selected = snapshot.selected.min(snapshot.movies.len() - 1);
        self.movies = snapshot.movies;
        self.next_page = snapshot.next_page.clamp(2, TOTAL_PAGES);
        self.last_page = TOTAL_PAGES;
        self.exhausted = snapshot.exhausted;
        self.loading = false;
        self.state = ViewState::Content;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: u64) -> Movie {
        Movie {
            id,
            title: format!("Movie {id}"),
            year: Some("2020".to_string()),
            overview: String::new(),
            rating: 7.0,
            poster_path: None,
            backdrop_path: None,
        }
    }

    fn page(number: u32, ids: std::ops::Range<u64>, total_pages: u32) -> MoviePage {
        MoviePage {
            page: number,
            total_pages,
            movies: ids.map(movie).collect(),
        }
    }

    fn loaded_pager() -> Pager {
        let mut pager = Pager::new();
        let req = pager.start();
        assert!(pager.apply_page(req, page(1, 0..20, 50)));
        pager
    }

    #[test]
    fn test_first_page_moves_to_content() {
        let mut pager = Pager::new();
        assert!(pager.is_pristine());

        let req = pager.start();
        assert_eq!(req.page, 1);
        assert_eq!(pager.state(), ViewState::Loading);
        assert!(pager.loading);

        pager.apply_page(req, page(1, 0..20, 50));
        assert_eq!(pager.state(), ViewState::Content);
        assert_eq!(pager.movies().len(), 20);
        assert_eq!(pager.next_page, 2);
        assert!(!pager.loading);
    }

    #[test]
    fn test_scroll_to_end_loads_next_page() {
        let mut pager = loaded_pager();
        assert!(!pager.wants_next_page(Some(10)));
        assert!(!pager.wants_next_page(None));
        assert!(pager.wants_next_page(Some(19)));

        let req = pager.begin_next_page().unwrap();
        assert_eq!(req.page, 2);
        assert_eq!(pager.state(), ViewState::Refreshing);

        // only one request in flight at a time
        assert!(!pager.wants_next_page(Some(19)));
        assert_eq!(pager.begin_next_page(), None);

        pager.apply_page(req, page(2, 20..40, 50));
        assert_eq!(pager.movies().len(), 40);
        assert_eq!(pager.movies()[20].id, 20);
        assert_eq!(pager.next_page, 3);
        assert_eq!(pager.state(), ViewState::Content);
    }

    #[test]
    fn test_pages_stop_at_server_total() {
        let mut pager = Pager::new();
        let req = pager.start();
        pager.apply_page(req, page(1, 0..20, 2));
        let req = pager.begin_next_page().unwrap();
        pager.apply_page(req, page(2, 20..25, 2));

        assert!(pager.is_exhausted());
        assert!(!pager.wants_next_page(Some(24)));
        assert_eq!(pager.begin_next_page(), None);
    }

    #[test]
    fn test_pages_never_exceed_total_pages_constant() {
        let mut pager = Pager::new();
        pager.restore(PagerSnapshot {
            movies: vec![movie(1)],
            next_page: TOTAL_PAGES - 1,
            exhausted: false,
            selected: 0,
        });
        let req = pager.begin_next_page().unwrap();
        assert_eq!(req.page, TOTAL_PAGES - 1);
        pager.apply_page(req, page(TOTAL_PAGES - 1, 2..3, 100_000));

        assert!(pager.is_exhausted());
        assert_eq!(pager.begin_next_page(), None);
    }

    #[test]
    fn test_cap_page_is_never_requested() {
        let mut pager = Pager::new();
        pager.restore(PagerSnapshot {
            movies: vec![movie(1)],
            next_page: TOTAL_PAGES + 5,
            exhausted: false,
            selected: 0,
        });
        assert_eq!(pager.begin_next_page(), None);
        assert!(pager.is_exhausted());
    }

    #[test]
    fn test_empty_page_exhausts_list() {
        let mut pager = loaded_pager();
        let req = pager.begin_next_page().unwrap();
        pager.apply_page(req, page(2, 0..0, 50));
        assert!(pager.is_exhausted());
        assert_eq!(pager.movies().len(), 20);
    }

    #[test]
    fn test_failure_clears_list_and_shows_error() {
        let mut pager = loaded_pager();
        pager.selected = 5;
        let req = pager.begin_next_page().unwrap();

        assert!(pager.fail(req));
        assert_eq!(pager.state(), ViewState::Error);
        assert!(pager.movies().is_empty());
        assert_eq!(pager.selected, 0);
        assert!(!pager.loading);
        assert!(!pager.wants_next_page(Some(0)));
    }

    #[test]
    fn test_retry_restarts_from_first_page() {
        let mut pager = loaded_pager();
        let req = pager.begin_next_page().unwrap();
        pager.fail(req);

        let req = pager.retry();
        assert_eq!(req.page, 1);
        assert_eq!(pager.state(), ViewState::Loading);

        pager.apply_page(req, page(1, 100..110, 50));
        assert_eq!(pager.state(), ViewState::Content);
        assert_eq!(pager.movies()[0].id, 100);
    }

    #[test]
    fn test_refresh_replaces_list_when_first_page_arrives() {
        let mut pager = loaded_pager();
        let req = pager.begin_next_page().unwrap();
        pager.apply_page(req, page(2, 20..40, 50));
        pager.selected = 30;

        let req = pager.refresh();
        assert_eq!(req.page, 1);
        assert_eq!(pager.state(), ViewState::Refreshing);
        // old content stays until the response lands
        assert_eq!(pager.movies().len(), 40);

        pager.apply_page(req, page(1, 500..520, 50));
        assert_eq!(pager.movies().len(), 20);
        assert_eq!(pager.movies()[0].id, 500);
        assert_eq!(pager.selected, 0);
        assert_eq!(pager.next_page, 2);
    }

    #[test]
    fn test_stale_response_after_refresh_is_dropped() {
        let mut pager = loaded_pager();
        let old = pager.begin_next_page().unwrap();
        let fresh = pager.refresh();

        assert!(!pager.apply_page(old, page(2, 20..40, 50)));
        assert!(!pager.fail(old));
        assert_eq!(pager.state(), ViewState::Refreshing);

        assert!(pager.apply_page(fresh, page(1, 0..20, 50)));
        assert_eq!(pager.movies().len(), 20);
    }

    #[test]
    fn test_refresh_on_empty_list_shows_loading() {
        let mut pager = Pager::new();
        pager.refresh();
        assert_eq!(pager.state(), ViewState::Loading);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_position() {
        let mut pager = loaded_pager();
        pager.selected = 12;
        let snapshot = pager.snapshot().unwrap();

        let mut restored = Pager::new();
        restored.restore(snapshot);
        assert_eq!(restored.movies().len(), 20);
        assert_eq!(restored.selected, 12);
        assert_eq!(restored.next_page, 2);
        assert_eq!(restored.state(), ViewState::Content);
        assert_eq!(restored.begin_next_page().map(|r| r.page), Some(2));
    }

    #[test]
    fn test_clear_makes_in_flight_fetch_stale() {
        let mut pager = Pager::new();
        let req = pager.start();
        pager.clear();
        assert!(pager.is_pristine());

        let fresh = pager.start();
        assert_ne!(req.generation, fresh.generation);
        assert!(!pager.apply_page(req, page(1, 0..5, 1)));
        assert!(pager.apply_page(fresh, page(1, 5..10, 1)));
        assert_eq!(pager.movies()[0].id, 5);
    }

    #[test]
    fn test_no_snapshot_for_error_or_empty() {
        let pager = Pager::new();
        assert!(pager.snapshot().is_none());

        let mut pager = loaded_pager();
        let req = pager.begin_next_page().unwrap();
        pager.fail(req);
        assert!(pager.snapshot().is_none());
    }

    #[test]
    fn test_restore_clamps_selection() {
        let mut pager = Pager::new();
        pager.restore(PagerSnapshot {
            movies: vec![movie(1), movie(2)],
            next_page: 2,
            exhausted: false,
            selected: 40,
        });
        assert_eq!(pager.selected, 1);
        assert_eq!(pager.movies()[pager.selected].id, 2);
    }
}
