mod backend;
mod config;
mod error;
mod ui;

use backend::cache::ResponseCache;
use backend::pager::{PageRequest, ViewState};
use backend::session::{Session, default_session_path};
use backend::tmdb::{MovieDetails, MoviePage, TmdbClient, movie_web_url};
use backend::watchlist::Watchlist;
use config::{Config, app_cache_dir};
use error::Result as CatalogResult;
use image::DynamicImage;
use ui::app::{App, ListId, Move, SEARCH_TAB, View};
use ui::ui::ui;

use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use ratatui_image::picker::Picker;
use std::{error::Error, fs, io};
use tokio::sync::mpsc;

enum BackgroundTask {
    PageLoaded {
        list: ListId,
        request: PageRequest,
        result: CatalogResult<MoviePage>,
    },
    DetailsLoaded {
        id: u64,
        result: CatalogResult<MovieDetails>,
    },
    ImageLoaded {
        url: String,
        image: Option<DynamicImage>,
    },
}

const DEBOUNCE_MS: u128 = 300;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("config file: {}", config::config_path().display());
            std::process::exit(1);
        }
    };

    let cache = ResponseCache::new(
        app_cache_dir().join("responses"),
        config.memory_cache_entries,
        config.disk_cache_mb,
    );
    let client = TmdbClient::new(config, cache)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let picker = Picker::from_query_stdio().ok();
    if picker.is_none() {
        log::info!("terminal image protocol unavailable, posters disabled");
    }
    let mut app = App::new(Watchlist::load(), picker);

    let session_path = default_session_path();
    if let Some(session) = Session::load(&session_path) {
        app.restore_session(session);
    }

    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();

    let res = run_app(&mut terminal, &mut app, &client, &mut task_rx, task_tx).await;

    if let Err(e) = app.session().save(&session_path) {
        log::warn!("failed to save session: {}", e);
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err}");
    }
    Ok(())
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging() {
    let dir = app_cache_dir();
    let file = fs::create_dir_all(&dir)
        .and_then(|_| fs::File::create(dir.join("watchlist.log")));

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

fn spawn_page_loader(
    client: &TmdbClient,
    list: ListId,
    url: String,
    request: PageRequest,
    invalidate_first: bool,
    tx: mpsc::UnboundedSender<BackgroundTask>,
) {
    let client = client.clone();
    tokio::spawn(async move {
        if invalidate_first {
            client.invalidate(&url).await;
        }
        let result = client.fetch_movie_page(&url).await;
        let _ = tx.send(BackgroundTask::PageLoaded {
            list,
            request,
            result,
        });
    });
}

fn spawn_details_loader(client: &TmdbClient, id: u64, tx: mpsc::UnboundedSender<BackgroundTask>) {
    let client = client.clone();
    tokio::spawn(async move {
        let result = client.fetch_movie_details(id).await;
        let _ = tx.send(BackgroundTask::DetailsLoaded { id, result });
    });
}

fn spawn_image_loader(client: &TmdbClient, url: String, tx: mpsc::UnboundedSender<BackgroundTask>) {
    let client = client.clone();
    tokio::spawn(async move {
        let image = client.fetch_image(&url).await;
        let _ = tx.send(BackgroundTask::ImageLoaded { url, image });
    });
}

#[derive(Clone, Copy)]
enum Fetch {
    Start,
    NextPage,
    Refresh,
    Retry,
}

/// Asks the list's pager for a ticket and, if one is issued, fetches it.
fn fetch(
    app: &mut App,
    client: &TmdbClient,
    id: ListId,
    kind: Fetch,
    tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    let list = app.list_mut(id);
    let request = match kind {
        Fetch::Start => Some(list.pager.start()),
        Fetch::NextPage => list.pager.begin_next_page(),
        Fetch::Refresh => Some(list.pager.refresh()),
        Fetch::Retry => Some(list.pager.retry()),
    };
    let Some(request) = request else {
        return;
    };

    let url = list.section.url_for_page(client.config(), request.page);
    log::info!("loading {} page {}", list.section.title(), request.page);
    spawn_page_loader(
        client,
        id,
        url,
        request,
        matches!(kind, Fetch::Refresh),
        tx.clone(),
    );
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    client: &TmdbClient,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    task_tx: mpsc::UnboundedSender<BackgroundTask>,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        // The first visit to a catalog tab starts its first page.
        if let Some(ListId::Catalog(i)) = app.active_list_id() {
            if app.catalog[i].pager.is_pristine() {
                fetch(app, client, ListId::Catalog(i), Fetch::Start, &task_tx);
            }
        }

        terminal.draw(|f| ui(f, app, client.config()))?;

        // Infinite scroll: the draw recorded how far the grid reaches.
        if let Some(id) = app.active_list_id() {
            let list = app.list(id);
            if list.pager.wants_next_page(list.last_visible) {
                fetch(app, client, id, Fetch::NextPage, &task_tx);
            }
        }

        request_visible_images(app, client, &task_tx);

        if let Some(debounce_time) = app.search_debounce {
            if debounce_time.elapsed().as_millis() >= DEBOUNCE_MS {
                app.search_debounce = None;
                if app.search_query != app.last_search_query && app.submit_search() {
                    fetch(app, client, ListId::Search, Fetch::Start, &task_tx);
                }
            }
        }

        tokio::select! {
            // Tick for spinners and the debounce timer
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(50)) => {}

            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if is_quit(app, &key) {
                        return Ok(());
                    }
                    match app.view {
                        View::Browse => handle_browse_input(app, key, client, &task_tx),
                        View::Detail => handle_detail_input(app, key.code),
                    }
                }
            }

            Some(task) = task_rx.recv() => {
                handle_task(app, task);
            }
        }
    }
}

fn is_quit(app: &App, key: &KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    key.code == KeyCode::Char('q') && !app.search_editing
}

fn handle_task(app: &mut App, task: BackgroundTask) {
    match task {
        BackgroundTask::PageLoaded {
            list,
            request,
            result,
        } => {
            let pager = &mut app.list_mut(list).pager;
            match result {
                Ok(page) => {
                    pager.apply_page(request, page);
                }
                Err(e) => {
                    if pager.fail(request) {
                        log::warn!("page {} failed: {}", request.page, e);
                    }
                }
            }
        }
        BackgroundTask::DetailsLoaded { id, result } => {
            let Some(detail) = app.detail.as_mut().filter(|d| d.movie.id == id) else {
                return;
            };
            match result {
                Ok(details) => detail.details = Some(details),
                Err(e) => {
                    log::warn!("details for {} failed: {}", id, e);
                    detail.details_failed = true;
                }
            }
        }
        BackgroundTask::ImageLoaded { url, image } => match image {
            Some(image) => app.add_image(&url, image),
            None => app.fail_image(&url),
        },
    }
}

/// Requests posters for the cards on screen, plus the backdrop in the detail
/// view. Each URL is requested once.
fn request_visible_images(
    app: &mut App,
    client: &TmdbClient,
    tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    if app.picker.is_none() {
        return;
    }
    let config = client.config();

    let urls: Vec<String> = match app.view {
        View::Detail => app
            .detail
            .as_ref()
            .and_then(|d| d.movie.backdrop_path.as_deref().or(d.movie.poster_path.as_deref()))
            .map(|p| config.backdrop_url(p))
            .into_iter()
            .collect(),
        View::Browse => {
            let (movies, _) = app.visible_movies();
            let (first, last) = match app.active_list_id() {
                Some(id) => {
                    let list = app.list(id);
                    let Some(last) = list.last_visible else {
                        return;
                    };
                    (list.scroll_row * app.columns, last)
                }
                None => (
                    app.watchlist_scroll_row * app.columns,
                    movies.len().saturating_sub(1),
                ),
            };
            movies
                .iter()
                .skip(first)
                .take(last.saturating_sub(first) + 1)
                .filter_map(|m| m.poster_path.as_deref())
                .map(|p| config.poster_url(p))
                .collect()
        }
    };

    for url in urls {
        if app.claim_image(&url) {
            spawn_image_loader(client, url, tx.clone());
        }
    }
}

fn handle_browse_input(
    app: &mut App,
    key: KeyEvent,
    client: &TmdbClient,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    if app.tab == SEARCH_TAB && app.search_editing {
        handle_search_input(app, key.code, client, task_tx);
        return;
    }

    match key.code {
        KeyCode::Tab => app.next_tab(),
        KeyCode::BackTab => app.prev_tab(),
        KeyCode::Left | KeyCode::Char('h') => app.move_selection(Move::Left),
        KeyCode::Right | KeyCode::Char('l') => app.move_selection(Move::Right),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(Move::Up),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(Move::Down),
        KeyCode::Enter => {
            if let Some(movie) = app.open_detail() {
                spawn_details_loader(client, movie.id, task_tx.clone());
            }
        }
        KeyCode::Char('w') => app.toggle_watchlist(),
        KeyCode::Char('r') => {
            if let Some(id) = app.active_list_id() {
                if id == ListId::Search && app.last_search_query.is_empty() {
                    return;
                }
                let kind = match app.list(id).pager.state() {
                    ViewState::Error => Fetch::Retry,
                    _ => Fetch::Refresh,
                };
                fetch(app, client, id, kind, task_tx);
            }
        }
        KeyCode::Char('/') if app.tab == SEARCH_TAB => {
            app.search_editing = true;
        }
        _ => {}
    }
}

fn handle_search_input(
    app: &mut App,
    key: KeyCode,
    client: &TmdbClient,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Char(c) => {
            app.search_query.push(c);
            app.search_debounce = Some(std::time::Instant::now());
        }
        KeyCode::Backspace => {
            app.search_query.pop();
            if app.search_query.is_empty() {
                app.clear_search();
            } else {
                app.search_debounce = Some(std::time::Instant::now());
            }
        }
        KeyCode::Enter => {
            app.search_editing = false;
            if app.submit_search() {
                fetch(app, client, ListId::Search, Fetch::Start, task_tx);
            }
        }
        KeyCode::Esc | KeyCode::Down | KeyCode::Tab => {
            app.search_editing = false;
        }
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Esc | KeyCode::Backspace => app.go_back(),
        KeyCode::Char('w') => app.toggle_watchlist(),
        KeyCode::Char('o') => {
            if let Some(detail) = &app.detail {
                let url = movie_web_url(detail.movie.id);
                if let Err(e) = webbrowser::open(&url) {
                    log::warn!("failed to open browser for {}: {}", url, e);
                    app.set_status("Could not open browser".to_string());
                }
            }
        }
        _ => {}
    }
}
