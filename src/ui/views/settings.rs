use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::store::{SettingsStore, StoreDeps};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Users on the left, the role catalog for the selected user on the right
pub struct SettingsView {
  store: SettingsStore,
}

impl SettingsView {
  pub fn new(deps: StoreDeps) -> Self {
    let mut store = SettingsStore::new(deps);
    store.load();
    Self { store }
  }

  fn render_users(&self, frame: &mut Frame, area: Rect) {
    let state = self.store.get_state();
    let users = state.visible_users();

    let title = if self.store.is_loading() {
      " Users (loading...) ".to_string()
    } else if let Some(e) = self.store.error() {
      format!(" Users (error: {}) ", e)
    } else if state.show_inactive {
      format!(" Users ({}, incl. inactive) ", users.len())
    } else {
      format!(" Users ({}) ", users.len())
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let items: Vec<ListItem> = users
      .iter()
      .map(|user| {
        let name_style = if user.active {
          Style::default().fg(Color::White)
        } else {
          Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
        };
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<16}", truncate(&user.username, 16)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(truncate(&user.full_name, 30), name_style),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    let mut list_state = ListState::default().with_selected(state.selected);
    frame.render_stateful_widget(list, area, &mut list_state);
  }

  fn render_roles(&self, frame: &mut Frame, area: Rect) {
    let state = self.store.get_state();
    let block = Block::default()
      .title(" Roles ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(user) = state.selected_user() else {
      let hint = Paragraph::new("Select a user to see their roles.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(hint, area);
      return;
    };

    let roles = state.roles_of(user);
    if roles.is_empty() {
      let empty = Paragraph::new("No roles defined.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(empty, area);
      return;
    }

    let items: Vec<ListItem> = roles
      .into_iter()
      .map(|(role, held)| {
        let (mark, style) = if held {
          ("[x]", Style::default().fg(Color::Green))
        } else {
          ("[ ]", Style::default().fg(Color::DarkGray))
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{} {:<14}", mark, role.name), style),
          Span::styled(
            role.description.clone(),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();
    frame.render_widget(List::new(items).block(block), area);
  }
}

impl View for SettingsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.store.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.store.select_prev(),
      KeyCode::Char('i') => self.store.toggle_inactive(),
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
      .split(area);
    self.render_users(frame, chunks[0]);
    self.render_roles(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Users".to_string()
  }

  fn tick(&mut self) {
    self.store.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("i", "inactive").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(25),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
