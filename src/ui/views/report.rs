use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, TableState};

use crate::report::ReportRow;
use crate::store::{DateFilter, ReportStore, StoreDeps};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Per-department lunch and dinner totals
pub struct ReportView {
  store: ReportStore,
}

/// Build the report table. Takes the rows by shared reference; rendering
/// never changes what the aggregator produced.
pub fn report_table(rows: &[ReportRow]) -> Table<'static> {
  let header = Row::new(["#", "DEPARTMENT", "LUNCH", "DINNER", "TOTAL"])
    .style(Style::default().fg(Color::Yellow).bold());

  let body: Vec<Row> = rows
    .iter()
    .map(|row| {
      Row::new(vec![
        Cell::from(row.id.to_string()).style(Style::default().fg(Color::DarkGray)),
        Cell::from(truncate(&row.department, 40)),
        Cell::from(row.lunch_requests.to_string()),
        Cell::from(row.dinner_requests.to_string()),
        Cell::from(row.total().to_string()).style(Style::default().bold()),
      ])
    })
    .collect();

  Table::new(
    body,
    [
      Constraint::Length(4),
      Constraint::Min(20),
      Constraint::Length(7),
      Constraint::Length(7),
      Constraint::Length(7),
    ],
  )
  .header(header)
  .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
  .highlight_symbol("> ")
}

impl ReportView {
  pub fn new(deps: StoreDeps) -> Self {
    let mut store = ReportStore::new(deps);
    store.load();
    Self { store }
  }

  fn title(&self) -> String {
    let date = self.store.get_state().date.label();
    if self.store.is_loading() {
      format!(" Report [{}] (loading...) ", date)
    } else if let Some(e) = self.store.error() {
      format!(" Report [{}] (error: {}) ", date, e)
    } else {
      let (lunch, dinner) = self.store.report().totals();
      format!(" Report [{}] (lunch {}, dinner {}) ", date, lunch, dinner)
    }
  }

  fn render_table(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let rows = &self.store.report().rows;
    if rows.is_empty() && !self.store.is_loading() {
      let content = if self.store.error().is_some() {
        "Failed to load meals. Press 'r' to retry."
      } else {
        "No meal requests for this selection."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let mut state = TableState::default().with_selected(self.store.get_state().selected);
    frame.render_stateful_widget(report_table(rows).block(block), area, &mut state);
  }

  fn render_warnings(&self, frame: &mut Frame, area: Rect) {
    let warnings = &self.store.report().warnings;
    let items: Vec<ListItem> = warnings
      .iter()
      .map(|w| ListItem::new(w.to_string()).style(Style::default().fg(Color::Red)))
      .collect();
    let block = Block::default()
      .title(format!(" Data warnings ({}) ", warnings.len()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red));
    frame.render_widget(List::new(items).block(block), area);
  }
}

impl View for ReportView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let today = Local::now().date_naive();
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.store.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.store.select_prev(),
      KeyCode::Char('h') | KeyCode::Left => self.store.shift_date(-1, today),
      KeyCode::Char('l') | KeyCode::Right => self.store.shift_date(1, today),
      KeyCode::Char('t') => self.store.set_date(DateFilter::On(today)),
      KeyCode::Char('a') => self.store.set_date(DateFilter::All),
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let warnings = self.store.report().warnings.len();
    if warnings == 0 {
      self.render_table(frame, area);
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(5),
        Constraint::Length((warnings as u16).min(6) + 2),
      ])
      .split(area);
    self.render_table(frame, chunks[0]);
    self.render_warnings(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Report [{}]", self.store.get_state().date.label())
  }

  fn tick(&mut self) {
    self.store.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("h/l", "day").with_priority(20),
      ShortcutInfo::new("t", "today").with_priority(21),
      ShortcutInfo::new("a", "all dates").with_priority(22),
      ShortcutInfo::new("r", "refresh").with_priority(25),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
