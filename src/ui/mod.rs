pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;

/// Main draw function: header, the top view, footer, and the command overlay
/// on top of everything
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let shortcuts = app
    .current_view()
    .map(|v| view::sorted_shortcuts(v))
    .unwrap_or_default();
  renderfns::draw_header(frame, chunks[0], app.title(), &shortcuts);

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  renderfns::draw_footer(frame, chunks[2], &app.view_breadcrumb(), app.status());

  app.command_input().render_overlay(frame, chunks[1]);
}
