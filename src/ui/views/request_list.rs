use crate::store::{RequestListStore, StoreDeps};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::{meal_type_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

/// Table of submitted meal requests
pub struct RequestListView {
  store: RequestListStore,
  search: SearchInput,
}

impl RequestListView {
  pub fn new(deps: StoreDeps) -> Self {
    let mut store = RequestListStore::new(deps);
    store.load();
    Self {
      store,
      search: SearchInput::new(),
    }
  }

  fn title(&self) -> String {
    let state = self.store.get_state();
    let count = if state.filter.is_empty() {
      format!("{}", state.meals.len())
    } else {
      format!(
        "{}/{} matching '{}'",
        state.visible().len(),
        state.meals.len(),
        state.filter
      )
    };
    if self.store.is_loading() {
      format!(" Requests ({}, loading...) ", count)
    } else if let Some(e) = self.store.error() {
      format!(" Requests (error: {}) ", e)
    } else {
      format!(" Requests ({}) ", count)
    }
  }

  fn render_table(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let state = self.store.get_state();
    let visible = state.visible();

    if visible.is_empty() && !self.store.is_loading() {
      let content = if self.store.error().is_some() {
        "Failed to load requests. Press 'r' to retry."
      } else if state.filter.is_empty() {
        "No meal requests yet. Use :new to file one."
      } else {
        "No requests match the filter."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Row::new(["DATE", "TYPE", "EMPLOYEE", "DEPARTMENT"])
      .style(Style::default().fg(Color::Yellow).bold());

    let rows: Vec<Row> = visible
      .iter()
      .map(|meal| {
        Row::new(vec![
          Cell::from(truncate(&meal.date, 10)),
          Cell::from(meal.meal_type.clone())
            .style(Style::default().fg(meal_type_color(&meal.meal_type))),
          Cell::from(truncate(&meal.employee, 30)),
          Cell::from(truncate(&meal.department, 30)),
        ])
      })
      .collect();

    let table = Table::new(
      rows,
      [
        Constraint::Length(11),
        Constraint::Length(8),
        Constraint::Percentage(45),
        Constraint::Percentage(45),
      ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ");

    let mut table_state = TableState::default().with_selected(state.selected);
    frame.render_stateful_widget(table, area, &mut table_state);
  }
}

impl View for RequestListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let result = self.search.handle_key(key);
    if let KeyResult::Event(SearchEvent::Changed(filter)) = &result {
      self.store.set_filter(filter);
    }
    if result.is_consumed() {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.store.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.store.select_prev(),
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Requests".to_string()
  }

  fn tick(&mut self) {
    self.store.poll();
  }

  fn is_capturing(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(25),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
