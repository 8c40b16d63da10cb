use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
};
use ratatui_image::{Resize, StatefulImage, protocol::StatefulProtocol};
use std::collections::HashMap;
use std::time::Duration;

use super::app::{App, DetailState, ListId, SEARCH_TAB, TAB_TITLES, View, WATCHLIST_TAB};
use crate::backend::pager::ViewState;
use crate::backend::tmdb::Movie;
use crate::config::Config;

pub const CARD_WIDTH: u16 = 24;
pub const CARD_HEIGHT: u16 = 14;
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Number of grid columns for a given width, never fewer than two.
pub fn grid_columns(width: u16) -> usize {
    let columns = (width as f32 / CARD_WIDTH as f32).round() as usize;
    columns.max(2)
}

/// Grid rows that fit completely in `height`. Zero when not even one card
/// fits.
pub fn grid_rows(height: u16) -> usize {
    (height / CARD_HEIGHT) as usize
}

/// Adjusts `scroll_row` so the selected card is on screen and returns the
/// index of the last card fully visible.
pub fn scroll_into_view(
    selected: usize,
    len: usize,
    columns: usize,
    rows: usize,
    scroll_row: &mut usize,
) -> Option<usize> {
    if len == 0 {
        *scroll_row = 0;
        return None;
    }
    if rows == 0 {
        return None;
    }
    let selected_row = selected.min(len - 1) / columns;
    if selected_row < *scroll_row {
        *scroll_row = selected_row;
    } else if selected_row >= *scroll_row + rows {
        *scroll_row = selected_row + 1 - rows;
    }
    let last_row_end = (*scroll_row + rows) * columns;
    Some(last_row_end.min(len) - 1)
}

pub fn ui(f: &mut Frame, app: &mut App, config: &Config) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tabs
            Constraint::Min(6),    // content
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_header(f, root[0], app);

    match app.view {
        View::Browse => draw_browse(f, root[1], app, config),
        View::Detail => draw_detail(f, root[1], app, config),
    }

    draw_footer(f, root[2], app);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let refreshing = app
        .active_list_id()
        .map(|id| app.list(id).pager.state() == ViewState::Refreshing)
        .unwrap_or(false);

    let title = if refreshing {
        format!("Watchlist {} ", spinner())
    } else {
        "Watchlist".to_string()
    };

    let tabs = Tabs::new(TAB_TITLES.to_vec())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .select(app.tab)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_browse(f: &mut Frame, area: Rect, app: &mut App, config: &Config) {
    let area = if app.tab == SEARCH_TAB {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(area);
        draw_search_box(f, parts[0], app);
        parts[1]
    } else {
        area
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(TAB_TITLES[app.tab])
        .border_style(Style::default().fg(Color::White));
    let inner = block.inner(area);
    f.render_widget(block, area);

    app.columns = grid_columns(inner.width);

    let Some(id) = app.active_list_id() else {
        if app.watchlist.is_empty() {
            draw_message(f, inner, "Your watchlist is empty. Press w on a movie to add it.");
            return;
        }
        let columns = app.columns;
        let App {
            watchlist,
            watchlist_selected,
            watchlist_scroll_row,
            image_states,
            ..
        } = app;
        draw_grid(
            f,
            inner,
            watchlist.movies(),
            *watchlist_selected,
            columns,
            watchlist_scroll_row,
            image_states,
            config,
        );
        return;
    };

    if id == ListId::Search && app.last_search_query.is_empty() {
        draw_message(f, inner, "Type a title and press Enter to search.");
        return;
    }

    let columns = app.columns;
    let App {
        catalog,
        search,
        image_states,
        ..
    } = app;
    let list = match id {
        ListId::Catalog(i) => &mut catalog[i],
        ListId::Search => search,
    };

    if !list.pager.movies().is_empty() {
        let end = if list.pager.is_exhausted() { " · end" } else { "" };
        let count = Paragraph::new(format!("{} movies{}", list.pager.movies().len(), end))
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Right);
        f.render_widget(count, Rect::new(area.x + 1, area.y, area.width.saturating_sub(2), 1));
    }

    match list.pager.state() {
        ViewState::Loading => {
            list.last_visible = None;
            draw_loading(f, inner, &format!("Loading {}...", list.section.title()));
        }
        ViewState::Error => {
            list.last_visible = None;
            draw_error(f, inner);
        }
        ViewState::Content | ViewState::Refreshing => {
            if list.pager.movies().is_empty() {
                list.last_visible = None;
                draw_message(f, inner, "No movies found.");
                return;
            }
            list.last_visible = draw_grid(
                f,
                inner,
                list.pager.movies(),
                list.pager.selected,
                columns,
                &mut list.scroll_row,
                image_states,
                config,
            );
        }
    }
}

fn draw_search_box(f: &mut Frame, area: Rect, app: &App) {
    let style = if app.search_editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    let cursor = if app.search_editing { "_" } else { "" };
    let line = Line::from(vec![
        Span::styled("🔍 ", Style::default().fg(Color::Cyan)),
        Span::styled(format!("{}{}", app.search_query, cursor), style),
    ]);
    let p = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search (/ to edit)")
            .border_style(style),
    );
    f.render_widget(p, area);
}

#[allow(clippy::too_many_arguments)]
fn draw_grid(
    f: &mut Frame,
    area: Rect,
    movies: &[Movie],
    selected: usize,
    columns: usize,
    scroll_row: &mut usize,
    image_states: &mut HashMap<String, StatefulProtocol>,
    config: &Config,
) -> Option<usize> {
    let rows = grid_rows(area.height);
    if rows == 0 {
        draw_message(f, area, "Window too small");
        return None;
    }
    let last_visible = scroll_into_view(selected, movies.len(), columns, rows, scroll_row)?;

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..rows).map(|_| Constraint::Length(CARD_HEIGHT)))
        .split(area);

    let first = *scroll_row * columns;
    for (r, row_area) in row_areas.iter().enumerate() {
        let card_areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints((0..columns).map(|_| Constraint::Fill(1)))
            .split(*row_area);

        for (c, card_area) in card_areas.iter().enumerate() {
            let idx = first + r * columns + c;
            let Some(movie) = movies.get(idx) else {
                return Some(last_visible);
            };
            let poster = match movie.poster_path.as_deref() {
                Some(path) => image_states.get_mut(&config.poster_url(path)),
                None => None,
            };
            draw_movie_card(f, *card_area, movie, idx == selected, poster);
        }
    }

    // more cards below the fold
    if last_visible + 1 < movies.len() {
        let indicator = Paragraph::new("▼").style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let indicator_area = Rect::new(
            area.x + area.width / 2,
            area.y + area.height.saturating_sub(1),
            1,
            1,
        );
        f.render_widget(indicator, indicator_area);
    }

    Some(last_visible)
}

fn draw_movie_card(
    f: &mut Frame,
    area: Rect,
    movie: &Movie,
    selected: bool,
    image_state: Option<&mut StatefulProtocol>,
) {
    let border_style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);

    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 4 || inner.width < 5 {
        return;
    }

    let card_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(2),    // poster
            Constraint::Length(1), // title
            Constraint::Length(1), // year and rating
        ])
        .split(inner);

    if let Some(state) = image_state {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, card_layout[0], state);
    } else {
        let placeholder = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("🎬", Style::default().fg(Color::Magenta))),
        ])
        .alignment(Alignment::Center);
        f.render_widget(placeholder, card_layout[0]);
    }

    let title = truncate_text(&movie.title, inner.width as usize);
    f.render_widget(
        Paragraph::new(title).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        card_layout[1],
    );

    f.render_widget(Paragraph::new(meta_line(movie)), card_layout[2]);
}

fn meta_line(movie: &Movie) -> Line<'_> {
    Line::from(vec![
        Span::styled("★ ", Style::default().fg(Color::Yellow)),
        Span::styled(format!("{:.1}", movie.rating), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(
            movie.year.as_deref().unwrap_or("----"),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn draw_detail(f: &mut Frame, area: Rect, app: &mut App, config: &Config) {
    let App {
        detail,
        watchlist,
        image_states,
        ..
    } = app;
    let Some(DetailState {
        movie,
        details,
        details_failed,
    }) = detail.as_ref()
    else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(movie.title.as_str())
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Min(4)])
        .split(inner);

    let backdrop = movie
        .backdrop_path
        .as_deref()
        .or(movie.poster_path.as_deref())
        .map(|p| config.backdrop_url(p));
    let backdrop_state = match backdrop {
        Some(url) => image_states.get_mut(&url),
        None => None,
    };
    match backdrop_state {
        Some(state) => {
            let image_widget = StatefulImage::new().resize(Resize::Scale(None));
            f.render_stateful_widget(image_widget, layout[0], state);
        }
        None => draw_message(f, layout[0], "🎬"),
    }

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                movie.title.as_str(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(
                movie
                    .year
                    .as_deref()
                    .map(|y| format!("({y})"))
                    .unwrap_or_default(),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  "),
            Span::styled(
                if watchlist.contains(movie.id) {
                    "✔ on watchlist"
                } else {
                    ""
                },
                Style::default().fg(Color::Green),
            ),
        ]),
        meta_line(movie),
    ];

    match details {
        Some(d) => {
            if let Some(tagline) = &d.tagline {
                lines.push(Line::from(Span::styled(
                    tagline.as_str(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
            let mut facts = Vec::new();
            if let Some(runtime) = d.runtime {
                facts.push(format!("{}h {:02}m", runtime / 60, runtime % 60));
            }
            if !d.genres.is_empty() {
                facts.push(d.genres.join(", "));
            }
            facts.push(format!("{} votes", d.vote_count));
            lines.push(Line::from(Span::styled(
                facts.join(" · "),
                Style::default().fg(Color::DarkGray),
            )));
            let links: Vec<String> = d
                .imdb_id
                .iter()
                .map(|id| format!("IMDb {id}"))
                .chain(d.homepage.iter().cloned())
                .collect();
            if !links.is_empty() {
                lines.push(Line::from(Span::styled(
                    links.join("  "),
                    Style::default().fg(Color::Blue),
                )));
            }
        }
        None if *details_failed => lines.push(Line::from(Span::styled(
            "Could not load details.",
            Style::default().fg(Color::Red),
        ))),
        None => lines.push(Line::from(Span::styled(
            format!("{} loading details...", spinner()),
            Style::default().fg(Color::DarkGray),
        ))),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(if movie.overview.is_empty() {
        "No overview available."
    } else {
        movie.overview.as_str()
    }));

    let text = Paragraph::new(lines).wrap(Wrap { trim: true });
    f.render_widget(text, layout[1]);
}

fn draw_loading(f: &mut Frame, area: Rect, message: &str) {
    let center = center_rows(area, 2);
    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            message,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ]);
    f.render_widget(
        Paragraph::new(loading_text).alignment(Alignment::Center),
        center,
    );
}

fn draw_error(f: &mut Frame, area: Rect) {
    let center = center_rows(area, 3);
    let text = vec![
        Line::from(Span::styled(
            "Couldn't load movies.",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("Press "),
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(" to try again"),
        ]),
    ];
    f.render_widget(Paragraph::new(text).alignment(Alignment::Center), center);
}

fn draw_message(f: &mut Frame, area: Rect, message: &str) {
    let center = center_rows(area, 1);
    f.render_widget(
        Paragraph::new(message)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray)),
        center,
    );
}

fn center_rows(area: Rect, height: u16) -> Rect {
    let top = area.height.saturating_sub(height) / 2;
    Rect::new(area.x, area.y + top, area.width, height.min(area.height))
}

fn spinner() -> &'static str {
    const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    FRAMES[(millis / 100) as usize % FRAMES.len()]
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App) {
    if let Some((message, at)) = &app.status {
        if at.elapsed() < STATUS_TIMEOUT {
            let p = Paragraph::new(message.as_str())
                .style(Style::default().fg(Color::Green))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .alignment(Alignment::Center);
            f.render_widget(p, area);
            return;
        }
    }

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let text = match app.view {
        View::Detail => Line::from(vec![
            key("Esc"),
            Span::raw(": back  "),
            key("w"),
            Span::raw(": watchlist  "),
            key("o"),
            Span::raw(": open in browser  "),
            key("q"),
            Span::raw(": quit"),
        ]),
        View::Browse if app.tab == SEARCH_TAB && app.search_editing => Line::from(vec![
            key("Enter"),
            Span::raw(": search  "),
            key("Esc"),
            Span::raw(": stop editing"),
        ]),
        View::Browse => {
            let mut spans = vec![
                key("Tab"),
                Span::raw(": section  "),
                key("←↑↓→"),
                Span::raw(": move  "),
                key("Enter"),
                Span::raw(": details  "),
                key("w"),
                Span::raw(": watchlist  "),
            ];
            if app.tab != WATCHLIST_TAB {
                spans.push(key("r"));
                spans.push(Span::raw(": refresh  "));
            }
            if app.tab == SEARCH_TAB {
                spans.push(key("/"));
                spans.push(Span::raw(": search  "));
            }
            spans.push(key("q"));
            spans.push(Span::raw(": quit"));
            Line::from(spans)
        }
    };

    let p = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_columns() {
        assert_eq!(grid_columns(0), 2);
        assert_eq!(grid_columns(30), 2);
        assert_eq!(grid_columns(CARD_WIDTH * 4), 4);
        // rounds to the nearest column count
        assert_eq!(grid_columns(CARD_WIDTH * 5 + CARD_WIDTH / 2 + 1), 6);
        assert_eq!(grid_columns(CARD_WIDTH * 5 + 2), 5);
    }

    #[test]
    fn test_grid_rows() {
        assert_eq!(grid_rows(3), 0);
        assert_eq!(grid_rows(CARD_HEIGHT - 1), 0);
        assert_eq!(grid_rows(CARD_HEIGHT), 1);
        assert_eq!(grid_rows(CARD_HEIGHT * 3 + 5), 3);
    }

    #[test]
    fn test_scroll_into_view() {
        let mut scroll_row = 0;
        // 20 cards, 4 wide, 2 rows on screen
        assert_eq!(scroll_into_view(0, 20, 4, 2, &mut scroll_row), Some(7));
        assert_eq!(scroll_row, 0);

        assert_eq!(scroll_into_view(9, 20, 4, 2, &mut scroll_row), Some(11));
        assert_eq!(scroll_row, 1);

        assert_eq!(scroll_into_view(19, 20, 4, 2, &mut scroll_row), Some(19));
        assert_eq!(scroll_row, 3);

        assert_eq!(scroll_into_view(2, 20, 4, 2, &mut scroll_row), Some(7));
        assert_eq!(scroll_row, 0);
    }

    #[test]
    fn test_scroll_into_view_short_list() {
        let mut scroll_row = 5;
        assert_eq!(scroll_into_view(0, 0, 3, 2, &mut scroll_row), None);
        assert_eq!(scroll_row, 0);
        assert_eq!(scroll_into_view(1, 3, 3, 2, &mut scroll_row), Some(2));
    }

    #[test]
    fn test_no_rows_means_nothing_visible() {
        let mut scroll_row = 0;
        assert_eq!(
            scroll_into_view(0, 20, 4, grid_rows(CARD_HEIGHT - 1), &mut scroll_row),
            None
        );
        assert_eq!(scroll_row, 0);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Heat", 10), "Heat");
        assert_eq!(truncate_text("The Lord of the Rings", 10), "The Lor...");
    }
}
