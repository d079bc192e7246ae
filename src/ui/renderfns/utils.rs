use ratatui::prelude::Color;

use crate::api::types::MealType;

/// Truncate a string to at most `max_len` characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a raw meal type; unknown types stand out
pub fn meal_type_color(raw: &str) -> Color {
  match MealType::parse(raw) {
    Some(MealType::Lunch) => Color::Green,
    Some(MealType::Dinner) => Color::Magenta,
    None => Color::Red,
  }
}
