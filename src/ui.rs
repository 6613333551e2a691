use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use vehicle_registry::{Record, RegistryCoordinator, DATE_FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Registrations,
    Expiring,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Registrations => Page::Expiring,
            Page::Expiring => Page::Registrations,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Registrations => "Registrations",
            Page::Expiring => "Expiring",
        }
    }
}

pub struct App {
    pub registry: RegistryCoordinator,
    /// Plates currently listed, in display order
    pub visible: Vec<String>,
    pub state: TableState,
    pub current_page: Page,
    pub prefix: String,
    pub editing_prefix: bool,
    pub show_detail: bool,
}

impl App {
    pub fn new(registry: RegistryCoordinator) -> Self {
        let mut app = Self {
            registry,
            visible: Vec::new(),
            state: TableState::default(),
            current_page: Page::Registrations,
            prefix: String::new(),
            editing_prefix: false,
            show_detail: false,
        };
        app.refresh();
        app
    }

    /// Rebuild the visible list from the index that serves the current page
    pub fn refresh(&mut self) {
        self.visible = match self.current_page {
            Page::Registrations if !self.prefix.is_empty() => {
                self.registry.find_by_prefix(&self.prefix)
            }
            Page::Registrations => {
                let mut plates: Vec<String> =
                    self.registry.records().map(|r| r.plate.clone()).collect();
                plates.sort();
                plates
            }
            Page::Expiring => self
                .registry
                .expiring_in_order()
                .into_iter()
                .map(|entry| entry.plate)
                .collect(),
        };

        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.refresh();
    }

    pub fn push_prefix(&mut self, ch: char) {
        self.prefix.push(ch.to_ascii_uppercase());
        self.refresh();
    }

    pub fn pop_prefix(&mut self) {
        self.prefix.pop();
        self.refresh();
    }

    pub fn clear_prefix(&mut self) {
        self.prefix.clear();
        self.editing_prefix = false;
        self.refresh();
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.state
            .selected()
            .and_then(|i| self.visible.get(i))
            .and_then(|plate| self.registry.find_by_plate(plate).ok())
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if app.editing_prefix {
                match key.code {
                    KeyCode::Enter => app.editing_prefix = false,
                    KeyCode::Esc => app.clear_prefix(),
                    KeyCode::Backspace => app.pop_prefix(),
                    KeyCode::Char(ch) if ch.is_ascii_alphanumeric() => app.push_prefix(ch),
                    _ => {}
                }
                continue;
            }

            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Esc if app.prefix.is_empty() => return Ok(()),
                KeyCode::Esc => app.clear_prefix(),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Char('/') => {
                    if app.current_page != Page::Registrations {
                        app.current_page = Page::Registrations;
                        app.refresh();
                    }
                    app.editing_prefix = true;
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    if !app.visible.is_empty() {
                        app.state.select(Some(app.visible.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(60), // Registration list
                Constraint::Percentage(40), // Detail panel
            ])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Registrations, Page::Expiring].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Total: {}", app.registry.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Owners: {}", app.registry.owners().len()),
        Style::default().fg(Color::Cyan),
    ));

    if let Some(next) = app.registry.peek_next_expiring() {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!(
                "Next: {} ({})",
                next.plate,
                next.expiration_date.format(DATE_FORMAT)
            ),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Plate", "Owner", "License", "Vehicle", "Expires"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .visible
        .iter()
        .filter_map(|plate| app.registry.find_by_plate(plate).ok())
        .map(|record| {
            let cells = vec![
                Cell::from(record.plate.clone()),
                Cell::from(truncate(&record.owner.full_name(), 24)),
                Cell::from(record.owner.license_number.clone()),
                Cell::from(truncate(
                    &format!(
                        "{} {} {}",
                        record.vehicle.year, record.vehicle.make, record.vehicle.model
                    ),
                    28,
                )),
                Cell::from(record.expiration_date.format(DATE_FORMAT).to_string()),
            ];
            Row::new(cells).height(1)
        })
        .collect();

    let title = match (app.current_page, app.prefix.is_empty()) {
        (Page::Registrations, false) => format!(" Registrations starting with '{}' ", app.prefix),
        (page, _) => format!(" {} ", page.title()),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(26),
            Constraint::Length(14),
            Constraint::Length(30),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.visible.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    status_spans.push(Span::raw(" | "));
    if app.editing_prefix {
        status_spans.push(Span::styled(
            format!("Prefix: {}▏", app.prefix),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" done, "));
        status_spans.push(Span::styled("Esc", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    } else {
        status_spans.push(Span::styled("/", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Search | "));
        status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Details | "));
        status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Page | "));
        status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Nav | "));
        status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
        status_spans.push(Span::raw(" Quit"));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

fn label(name: &str) -> Span<'static> {
    Span::styled(
        format!("  {}: ", name),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Registration Details ");

    let Some(record) = app.selected_record() else {
        f.render_widget(Paragraph::new("No registration selected").block(block), area);
        return;
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![label("Plate"), Span::raw(record.plate.clone())]),
        Line::from(vec![
            label("Vehicle"),
            Span::raw(format!(
                "{} {} {}",
                record.vehicle.year, record.vehicle.make, record.vehicle.model
            )),
        ]),
        Line::from(vec![label("Color"), Span::raw(record.vehicle.color.clone())]),
        Line::from(vec![
            label("Class"),
            Span::raw(record.vehicle.classification.clone()),
        ]),
        Line::from(vec![label("VIN"), Span::raw(record.vehicle.vin.clone())]),
        Line::from(""),
        Line::from(vec![
            label("Registered"),
            Span::raw(record.registration_date.format(DATE_FORMAT).to_string()),
        ]),
        Line::from(vec![
            label("Expires"),
            Span::styled(
                record.expiration_date.format(DATE_FORMAT).to_string(),
                Style::default().fg(Color::Red),
            ),
        ]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  OWNER",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        Line::from(vec![label("Name"), Span::raw(record.owner.full_name())]),
        Line::from(vec![
            label("License"),
            Span::raw(record.owner.license_number.clone()),
        ]),
    ];

    // Everything else this owner holds, straight from the owner index
    if let Ok(owner) = app.registry.find_by_owner(&record.owner.license_number) {
        content.push(Line::from(vec![label("Plates")]));
        for plate in owner.plates {
            let style = if plate == record.plate {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            content.push(Line::from(vec![
                Span::raw("    • "),
                Span::styled(plate, style),
            ]));
        }
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![Span::styled(
        "  Press Enter to close",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )]));

    f.render_widget(Paragraph::new(content).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vehicle_registry::{Owner, Vehicle};

    fn app() -> App {
        let mut registry = RegistryCoordinator::new();
        let plates = [
            ("XYZ789", "2023-12-01"),
            ("ABC123", "2024-01-15"),
            ("ABD001", "2023-06-01"),
        ];
        for (plate, expires) in plates {
            registry
                .add_vehicle(
                    plate,
                    Vehicle::new("Mazda", "3", 2021, "Grey", "Passenger", "VIN"),
                    Owner::new("Ana", "Ruiz", "DL5"),
                    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                    NaiveDate::parse_from_str(expires, DATE_FORMAT).unwrap(),
                )
                .unwrap();
        }
        App::new(registry)
    }

    #[test]
    fn test_registrations_page_lists_sorted_plates() {
        let app = app();
        assert_eq!(app.visible, vec!["ABC123", "ABD001", "XYZ789"]);
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_prefix_narrows_list() {
        let mut app = app();
        app.push_prefix('a');
        app.push_prefix('b');
        app.push_prefix('c');
        assert_eq!(app.visible, vec!["ABC123"]);

        app.pop_prefix();
        assert_eq!(app.visible, vec!["ABC123", "ABD001"]);

        app.clear_prefix();
        assert_eq!(app.visible.len(), 3);
    }

    #[test]
    fn test_expiring_page_follows_queue_order() {
        let mut app = app();
        app.next_page();
        assert_eq!(app.visible, vec!["ABD001", "XYZ789", "ABC123"]);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        assert_eq!(app.selected_record().map(|r| r.plate.as_str()), Some("ABC123"));
    }
}
