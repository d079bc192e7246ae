use chrono::Days;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::api::types::MealType;
use crate::store::{
  step_selection, DraftError, DraftPatch, NewRequestStore, StoreDeps, SubmitStatus,
};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Employee,
  Department,
  MealType,
  Date,
  Note,
}

impl Field {
  const ALL: [Field; 5] = [
    Field::Employee,
    Field::Department,
    Field::MealType,
    Field::Date,
    Field::Note,
  ];

  fn label(self) -> &'static str {
    match self {
      Field::Employee => "Employee",
      Field::Department => "Department",
      Field::MealType => "Meal",
      Field::Date => "Date",
      Field::Note => "Note",
    }
  }
}

/// Form for filing a meal request
pub struct NewRequestView {
  store: NewRequestStore,
  focus: usize,
  /// Set while the note is being edited
  note: Option<TextInput>,
  invalid: Option<DraftError>,
}

impl NewRequestView {
  pub fn new(deps: StoreDeps) -> Self {
    let mut store = NewRequestStore::new(deps);
    store.load_options();
    Self {
      store,
      focus: 0,
      note: None,
      invalid: None,
    }
  }

  fn focused(&self) -> Field {
    Field::ALL[self.focus]
  }

  /// Change the focused field's value by one step in `delta`'s direction.
  fn adjust(&mut self, delta: isize) {
    let draft = &self.store.get_state().draft;
    let patch = match self.focused() {
      Field::Employee => {
        let options = self.store.employees();
        let current = draft
          .employee
          .as_ref()
          .and_then(|e| options.iter().position(|o| o.id == e.id));
        DraftPatch {
          employee: step_selection(current, options.len(), delta).map(|i| options[i].clone()),
          ..DraftPatch::default()
        }
      }
      Field::Department => {
        let options = self.store.departments();
        let current = draft
          .department
          .as_ref()
          .and_then(|d| options.iter().position(|o| o.id == d.id));
        DraftPatch {
          department: step_selection(current, options.len(), delta).map(|i| options[i].clone()),
          ..DraftPatch::default()
        }
      }
      Field::MealType => DraftPatch {
        meal_type: Some(draft.meal_type.map(MealType::toggle).unwrap_or(MealType::Lunch)),
        ..DraftPatch::default()
      },
      Field::Date => {
        let Some(date) = draft.date else {
          return;
        };
        let moved = if delta < 0 {
          date.checked_sub_days(Days::new(1))
        } else {
          date.checked_add_days(Days::new(1))
        };
        DraftPatch {
          date: moved,
          ..DraftPatch::default()
        }
      }
      Field::Note => return,
    };
    self.invalid = None;
    self.store.update(patch);
  }

  fn submit(&mut self) {
    self.invalid = self.store.submit().err();
  }

  fn handle_note_key(&mut self, key: KeyEvent) {
    let Some(input) = self.note.as_mut() else {
      return;
    };
    match input.handle_key(key) {
      InputResult::Submitted(value) => {
        self.note = None;
        self.store.update(DraftPatch {
          note: Some(value),
          ..DraftPatch::default()
        });
      }
      InputResult::Cancelled => self.note = None,
      InputResult::Consumed | InputResult::NotHandled => {}
    }
  }

  fn field_value(&self, field: Field) -> Span<'static> {
    let draft = &self.store.get_state().draft;
    let unset = |text: &str| Span::styled(text.to_string(), Style::default().fg(Color::DarkGray));
    match field {
      Field::Employee => match &draft.employee {
        Some(e) => Span::raw(format!("{} ({})", e.full_name, e.username)),
        None if self.store.options_loading() => unset("loading..."),
        None => unset("choose with h/l"),
      },
      Field::Department => match &draft.department {
        Some(d) => Span::raw(d.name.clone()),
        None if self.store.options_loading() => unset("loading..."),
        None => unset("choose with h/l"),
      },
      Field::MealType => match draft.meal_type {
        Some(t) => Span::raw(t.to_string()),
        None => unset("lunch or dinner"),
      },
      Field::Date => match draft.date {
        Some(d) => Span::raw(d.format("%a %Y-%m-%d").to_string()),
        None => unset("none"),
      },
      Field::Note => match &self.note {
        Some(input) => Span::styled(
          format!("{}_", input.value()),
          Style::default().fg(Color::Yellow),
        ),
        None if draft.note.is_empty() => unset("optional, Enter to edit"),
        None => Span::raw(draft.note.clone()),
      },
    }
  }

  fn status_line(&self) -> Line<'static> {
    if let Some(e) = &self.invalid {
      return Line::styled(
        format!("Incomplete: {}", e),
        Style::default().fg(Color::Yellow),
      );
    }
    if let Some(e) = self.store.options_error() {
      return Line::styled(
        format!("Could not load options: {} (r to retry)", e),
        Style::default().fg(Color::Red),
      );
    }
    match &self.store.get_state().status {
      SubmitStatus::Idle => Line::raw(""),
      SubmitStatus::Submitting => {
        Line::styled("Submitting...", Style::default().fg(Color::Yellow))
      }
      SubmitStatus::Submitted { id: Some(id) } => Line::styled(
        format!("Request #{} submitted", id),
        Style::default().fg(Color::Green),
      ),
      SubmitStatus::Submitted { id: None } => {
        Line::styled("Request submitted", Style::default().fg(Color::Green))
      }
      SubmitStatus::Failed(message) => Line::styled(
        format!("Submit failed: {}", message),
        Style::default().fg(Color::Red),
      ),
    }
  }
}

impl View for NewRequestView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.note.is_some() {
      self.handle_note_key(key);
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => {
        self.focus = (self.focus + 1) % Field::ALL.len();
      }
      KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => {
        self.focus = (self.focus + Field::ALL.len() - 1) % Field::ALL.len();
      }
      KeyCode::Char('h') | KeyCode::Left => self.adjust(-1),
      KeyCode::Char('l') | KeyCode::Right => self.adjust(1),
      KeyCode::Enter if self.focused() == Field::Note => {
        self.note = Some(TextInput::with_value(&self.store.get_state().draft.note));
      }
      KeyCode::Enter => self.submit(),
      KeyCode::Char('s') => self.submit(),
      KeyCode::Char('n') => {
        self.invalid = None;
        self.store.update(DraftPatch {
          reset: true,
          ..DraftPatch::default()
        });
      }
      KeyCode::Char('r') => self.store.reload_options(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(" New meal request ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let mut lines: Vec<Line> = Field::ALL
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let focused = i == self.focus;
        let marker = if focused { "> " } else { "  " };
        let label_style = if focused {
          Style::default().fg(Color::Cyan).bold()
        } else {
          Style::default().fg(Color::White)
        };
        Line::from(vec![
          Span::styled(marker, Style::default().fg(Color::Cyan)),
          Span::styled(format!("{:<12}", field.label()), label_style),
          self.field_value(*field),
        ])
      })
      .collect();
    lines.push(Line::raw(""));
    lines.push(self.status_line());

    let paragraph = Paragraph::new(lines)
      .block(block)
      .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    "New Request".to_string()
  }

  fn tick(&mut self) {
    self.store.poll();
  }

  fn is_capturing(&self) -> bool {
    self.note.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("h/l", "change").with_priority(20),
      ShortcutInfo::new("s", "submit").with_priority(21),
      ShortcutInfo::new("n", "clear").with_priority(22),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
