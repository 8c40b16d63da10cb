use image::DynamicImage;
use ratatui_image::{picker::Picker, protocol::StatefulProtocol};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::backend::catalog::Section;
use crate::backend::pager::Pager;
use crate::backend::session::Session;
use crate::backend::tmdb::{Movie, MovieDetails};
use crate::backend::watchlist::Watchlist;

pub const TAB_TITLES: [&str; 6] = [
    "Popular",
    "Top Rated",
    "Upcoming",
    "Now Playing",
    "Search",
    "Watchlist",
];
pub const SEARCH_TAB: usize = 4;
pub const WATCHLIST_TAB: usize = 5;

/// Which paginated list a background result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListId {
    Catalog(usize),
    Search,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum View {
    #[default]
    Browse,
    Detail,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Move {
    Left,
    Right,
    Up,
    Down,
}

/// A pager plus what the grid needs to draw it.
pub struct MovieList {
    pub section: Section,
    pub pager: Pager,
    pub scroll_row: usize,
    /// Index of the last card fully drawn in the previous frame.
    pub last_visible: Option<usize>,
}

impl MovieList {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            pager: Pager::new(),
            scroll_row: 0,
            last_visible: None,
        }
    }
}

pub struct DetailState {
    pub movie: Movie,
    pub details: Option<MovieDetails>,
    pub details_failed: bool,
}

pub struct App {
    pub tab: usize,
    pub view: View,
    pub catalog: Vec<MovieList>,
    pub search: MovieList,
    pub search_query: String,
    pub last_search_query: String,
    pub search_editing: bool,
    pub search_debounce: Option<Instant>,
    pub watchlist: Watchlist,
    pub watchlist_selected: usize,
    pub watchlist_scroll_row: usize,
    pub detail: Option<DetailState>,
    pub columns: usize,
    pub status: Option<(String, Instant)>,
    pub picker: Option<Picker>,
    pub image_states: HashMap<String, StatefulProtocol>,
    pub pending_images: HashSet<String>,
    /// Images that failed to download or decode. Not requested again.
    pub failed_images: HashSet<String>,
}

impl App {
    pub fn new(watchlist: Watchlist, picker: Option<Picker>) -> Self {
        Self {
            tab: 0,
            view: View::Browse,
            catalog: Section::CATALOG.into_iter().map(MovieList::new).collect(),
            search: MovieList::new(Section::Search(String::new())),
            search_query: String::new(),
            last_search_query: String::new(),
            search_editing: false,
            search_debounce: None,
            watchlist,
            watchlist_selected: 0,
            watchlist_scroll_row: 0,
            detail: None,
            columns: 2,
            status: None,
            picker,
            image_states: HashMap::new(),
            pending_images: HashSet::new(),
            failed_images: HashSet::new(),
        }
    }

    pub fn restore_session(&mut self, mut session: Session) {
        for list in &mut self.catalog {
            if let Some(snapshot) = list.section.session_key().and_then(|k| session.take(k)) {
                log::info!(
                    "restored {} movies for {}",
                    snapshot.movies.len(),
                    list.section.title()
                );
                list.pager.restore(snapshot);
            }
        }
        self.tab = session.active_tab.min(TAB_TITLES.len() - 1);
    }

    pub fn session(&self) -> Session {
        let mut session = Session {
            active_tab: self.tab,
            ..Session::default()
        };
        for list in &self.catalog {
            if let (Some(key), Some(snapshot)) = (list.section.session_key(), list.pager.snapshot()) {
                session.lists.insert(key.to_string(), snapshot);
            }
        }
        session
    }

    pub fn active_list_id(&self) -> Option<ListId> {
        match self.tab {
            SEARCH_TAB => Some(ListId::Search),
            WATCHLIST_TAB => None,
            i => Some(ListId::Catalog(i)),
        }
    }

    pub fn list(&self, id: ListId) -> &MovieList {
        match id {
            ListId::Catalog(i) => &self.catalog[i],
            ListId::Search => &self.search,
        }
    }

    pub fn list_mut(&mut self, id: ListId) -> &mut MovieList {
        match id {
            ListId::Catalog(i) => &mut self.catalog[i],
            ListId::Search => &mut self.search,
        }
    }

    pub fn next_tab(&mut self) {
        self.tab = (self.tab + 1) % TAB_TITLES.len();
    }

    pub fn prev_tab(&mut self) {
        self.tab = (self.tab + TAB_TITLES.len() - 1) % TAB_TITLES.len();
    }

    /// Movies on the current tab and the selected index.
    pub fn visible_movies(&self) -> (&[Movie], usize) {
        match self.active_list_id() {
            Some(id) => {
                let list = self.list(id);
                (list.pager.movies(), list.pager.selected)
            }
            None => (self.watchlist.movies(), self.watchlist_selected),
        }
    }

    pub fn selected_movie(&self) -> Option<&Movie> {
        let (movies, selected) = self.visible_movies();
        movies.get(selected)
    }

    pub fn move_selection(&mut self, direction: Move) {
        let columns = self.columns;
        match self.active_list_id() {
            Some(id) => {
                let pager = &mut self.list_mut(id).pager;
                pager.selected = step(pager.selected, pager.movies().len(), columns, direction);
            }
            None => {
                self.watchlist_selected = step(
                    self.watchlist_selected,
                    self.watchlist.len(),
                    columns,
                    direction,
                );
            }
        }
    }

    /// Replaces the search list with a fresh one for the current query.
    /// Returns false when the query is blank.
    pub fn submit_search(&mut self) -> bool {
        let query = self.search_query.trim().to_string();
        self.search_debounce = None;
        if query.is_empty() {
            return false;
        }
        self.last_search_query = self.search_query.clone();
        self.search.section = Section::Search(query);
        self.search.pager.clear();
        self.search.scroll_row = 0;
        self.search.last_visible = None;
        true
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
        self.last_search_query.clear();
        self.search_debounce = None;
        self.search.section = Section::Search(String::new());
        self.search.pager.clear();
    }

    pub fn open_detail(&mut self) -> Option<Movie> {
        let movie = self.selected_movie()?.clone();
        self.detail = Some(DetailState {
            movie: movie.clone(),
            details: None,
            details_failed: false,
        });
        self.view = View::Detail;
        Some(movie)
    }

    pub fn go_back(&mut self) {
        self.view = View::Browse;
        self.detail = None;
    }

    /// Toggles the movie shown in the detail view, or the selected card.
    pub fn toggle_watchlist(&mut self) {
        let movie = match &self.detail {
            Some(detail) if self.view == View::Detail => Some(detail.movie.clone()),
            _ => self.selected_movie().cloned(),
        };
        let Some(movie) = movie else {
            return;
        };

        let added = self.watchlist.toggle(&movie);
        if self.watchlist_selected >= self.watchlist.len() {
            self.watchlist_selected = self.watchlist.len().saturating_sub(1);
        }
        let message = if added {
            format!("Added \"{}\" to watchlist", movie.title)
        } else {
            format!("Removed \"{}\" from watchlist", movie.title)
        };
        self.set_status(message);
    }

    pub fn set_status(&mut self, message: String) {
        self.status = Some((message, Instant::now()));
    }

    pub fn add_image(&mut self, url: &str, image: DynamicImage) {
        self.pending_images.remove(url);
        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol(image);
            self.image_states.insert(url.to_string(), protocol);
        }
    }

    pub fn fail_image(&mut self, url: &str) {
        self.pending_images.remove(url);
        self.failed_images.insert(url.to_string());
    }

    /// Marks `url` as requested. Returns false when it is already loaded, in
    /// flight or known to fail, or when the terminal cannot show images.
    pub fn claim_image(&mut self, url: &str) -> bool {
        if self.picker.is_none()
            || self.image_states.contains_key(url)
            || self.failed_images.contains(url)
        {
            return false;
        }
        self.pending_images.insert(url.to_string())
    }
}

/// Grid cursor movement over `len` cards laid out `columns` wide.
pub fn step(selected: usize, len: usize, columns: usize, direction: Move) -> usize {
    if len == 0 {
        return 0;
    }
    let columns = columns.max(1);
    let last = len - 1;
    let selected = selected.min(last);
    match direction {
        Move::Left => selected.saturating_sub(1),
        Move::Right => (selected + 1).min(last),
        Move::Up => selected.checked_sub(columns).unwrap_or(selected),
        Move::Down => {
            if selected + columns <= last {
                selected + columns
            } else if selected / columns < last / columns {
                // partial last row: land on its final card
                last
            } else {
                selected
            }
        }
    }
}
