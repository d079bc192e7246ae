use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::store::Feature;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Replace the whole stack with a freshly mounted feature
  Open(Feature),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// A view owns the store for its feature. Dropping the view disposes the
/// store's scope, so popping it off the stack is the unmount.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick so the view can apply finished fetches
  fn tick(&mut self) {}

  /// True while the view is capturing text (search, note editing), so
  /// global keys like `:` are passed through to it
  fn is_capturing(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

/// Shortcuts sorted for display
pub fn sorted_shortcuts(view: &dyn View) -> Vec<ShortcutInfo> {
  let mut shortcuts = view.shortcuts();
  shortcuts.sort_by_key(|s| s.priority);
  shortcuts
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Plain;

  impl View for Plain {
    fn handle_key(&mut self, _key: KeyEvent) -> ViewAction {
      ViewAction::None
    }

    fn render(&mut self, _frame: &mut Frame, _area: Rect) {}

    fn breadcrumb_label(&self) -> String {
      "Plain".to_string()
    }

    fn shortcuts(&self) -> Vec<ShortcutInfo> {
      vec![
        ShortcutInfo::new("r", "refresh"),
        ShortcutInfo::new(":", "command").with_priority(10),
      ]
    }
  }

  #[test]
  fn test_shortcuts_sorted_by_priority() {
    let keys: Vec<_> = sorted_shortcuts(&Plain).iter().map(|s| s.key).collect();
    assert_eq!(keys, vec![":", "r"]);
  }

  #[test]
  fn test_views_do_not_capture_by_default() {
    assert!(!Plain.is_capturing());
  }
}
