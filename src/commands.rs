//! `:` commands and their autocomplete.

use crate::store::Feature;

/// What running a command does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Open(Feature),
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "new",
    aliases: &["n", "add", "request"],
    description: "File a meal request",
    action: Action::Open(Feature::NewRequest),
  },
  Command {
    name: "requests",
    aliases: &["meals", "list", "ls"],
    description: "Browse submitted requests",
    action: Action::Open(Feature::Requests),
  },
  Command {
    name: "report",
    aliases: &["rep", "totals", "summary"],
    description: "Lunch and dinner totals per department",
    action: Action::Open(Feature::Report),
  },
  Command {
    name: "settings",
    aliases: &["users", "roles", "u"],
    description: "Users and their roles",
    action: Action::Open(Feature::Settings),
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit mealdesk",
    action: Action::Quit,
  },
];

/// Get autocomplete suggestions for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();

  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input).map(|rank| (cmd, rank)))
    .collect();

  // Stable, so equal ranks keep declaration order
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; `None` means no match at all
fn match_rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Command for exactly this name or alias
pub fn find(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
}
