use crate::commands::Action;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::store::{Feature, StoreDeps};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::mount;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

/// Main application state
pub struct App {
  /// Navigation stack of mounted views; popping a view unmounts it
  view_stack: Vec<Box<dyn View>>,

  /// `:` command overlay
  command: CommandInput,

  /// Shared collaborators handed to every mounted store
  deps: StoreDeps,

  /// Header context
  title: String,

  /// Last message for the footer
  status: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, deps: StoreDeps, initial: Feature) -> Self {
    let mut app = Self {
      view_stack: Vec::new(),
      command: CommandInput::new(),
      deps,
      title: config.display_title(),
      status: None,
      should_quit: false,
    };
    app.open(initial);
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.event_loop().await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(Duration::from_millis(100));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    info!("quitting");
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Resize(..) => {} // Redrawn on the next loop iteration
    }
  }

  /// Let every mounted view apply finished fetches, not only the top one
  pub fn tick(&mut self) {
    for view in &mut self.view_stack {
      view.tick();
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self.current_view().is_some_and(|v| v.is_capturing());
    if !capturing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(action)) => {
          self.run_action(action);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          self.status = Some(format!("unknown command '{}'", input));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };
    self.apply(action);
  }

  fn run_action(&mut self, action: Action) {
    match action {
      Action::Open(feature) => self.open(feature),
      Action::Quit => self.should_quit = true,
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "push");
        self.view_stack.push(view);
      }
      ViewAction::Open(feature) => self.open(feature),
      ViewAction::Pop => {
        // Dropping the view disposes its store
        if let Some(view) = self.view_stack.pop() {
          debug!(view = %view.breadcrumb_label(), "pop");
        }
        if self.view_stack.is_empty() {
          self.should_quit = true;
        }
      }
    }
  }

  /// Unmount everything and mount `feature` as the new root
  fn open(&mut self, feature: Feature) {
    self.view_stack.clear();
    self.status = None;
    self.view_stack.push(mount(feature, &self.deps));
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
