//! `:` commands and their autocomplete ranking.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Listings,
  Featured,
  Mine,
  Drafts,
  Profile,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub kind: CommandKind,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "listings",
    aliases: &["l", "ls", "browse"],
    description: "Browse active listings",
    kind: CommandKind::Listings,
  },
  Command {
    name: "featured",
    aliases: &["f", "feat"],
    description: "Featured listings",
    kind: CommandKind::Featured,
  },
  Command {
    name: "mine",
    aliases: &["m", "my", "host"],
    description: "Your listings",
    kind: CommandKind::Mine,
  },
  Command {
    name: "drafts",
    aliases: &["d", "draft"],
    description: "Your unpublished drafts",
    kind: CommandKind::Drafts,
  },
  Command {
    name: "profile",
    aliases: &["p", "me", "account"],
    description: "Account and host status",
    kind: CommandKind::Profile,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit staydeck",
    kind: CommandKind::Quit,
  },
];

/// Look up a command by exact name or alias.
pub fn find(name: &str) -> Option<&'static Command> {
  let name = name.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == name || cmd.aliases.contains(&name.as_str()))
}

/// Rank of `cmd` for `input`, lower is better. `None` means no match.
fn rank(cmd: &Command, input: &str) -> Option<u8> {
  let aliases = || cmd.aliases.iter();
  if cmd.name == input {
    Some(0)
  } else if aliases().any(|a| *a == input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if aliases().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if aliases().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Autocomplete suggestions for `input`, best match first.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (r, cmd)))
    .collect();
  ranked.sort_by_key(|(r, _)| *r);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_name_first() {
    let suggestions = get_suggestions("drafts");
    assert_eq!(suggestions[0].kind, CommandKind::Drafts);
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("f");
    assert_eq!(suggestions[0].kind, CommandKind::Featured);

    let suggestions = get_suggestions("me");
    assert_eq!(suggestions[0].kind, CommandKind::Profile);
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("pro");
    assert_eq!(suggestions[0].kind, CommandKind::Profile);
  }

  #[test]
  fn test_substring_match() {
    let suggestions = get_suggestions("tured");
    assert_eq!(suggestions[0].kind, CommandKind::Featured);
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_find_by_alias() {
    assert_eq!(find("host").map(|c| c.kind), Some(CommandKind::Mine));
    assert_eq!(find(" Quit ").map(|c| c.kind), Some(CommandKind::Quit));
    assert!(find("unknown").is_none());
  }
}
