//! Client command parsing
//!
//! Every input line is either a slash command such as
//! `/add https://github.com/octo/app ghp_token dev` or chat text for the
//! agent. Commands that map onto a state machine [`Action`] convert with
//! [`Command::into_action`]; the rest are handled by the event loop.

use chatstack_protocol::{ConfigData, Repository, RepositoryError};

use crate::state::Action;

/// Read-only listing a command can print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Tree,
    Repositories,
    Status,
}

/// Parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Submit configuration, optionally registering one repository
    Config {
        gemini_token: String,
        repository: Option<Repository>,
    },
    /// Register a repository
    Add(Repository),
    /// Replace a registered repository
    Update {
        repository_id: String,
        repository: Repository,
    },
    /// Remove a registered repository
    Delete { repository_id: String },
    /// Make a repository active and load its tree
    Select { repository_id: String },
    /// Reload the tree of a repository
    Fetch { repository_id: String },
    /// Toggle a path in the selection
    Toggle { path: String },
    /// Drop the session and start over
    Reset,
    /// Dismiss a notice by id
    Dismiss(u64),
    /// Start a new connection after the reconnect budget ran out
    Reconnect,
    /// Print a listing
    Show(Panel),
    Help,
    Quit,
    /// Plain text for the agent
    Chat(String),
    /// Unknown command name
    Unknown(String),
}

impl Command {
    /// The state machine action this command stands for, if any
    pub fn into_action(self) -> Option<Action> {
        let action = match self {
            Command::Config {
                gemini_token,
                repository,
            } => Action::SubmitConfig(ConfigData {
                gemini_token,
                repositories: repository.into_iter().collect(),
            }),
            Command::Add(repository) => Action::AddRepository(repository),
            Command::Update {
                repository_id,
                repository,
            } => Action::UpdateRepository {
                repository_id,
                repository,
            },
            Command::Delete { repository_id } => Action::DeleteRepository { repository_id },
            Command::Select { repository_id } => Action::SelectRepository { repository_id },
            Command::Fetch { repository_id } => Action::FetchFiles { repository_id },
            Command::Toggle { path } => Action::ToggleSelection { path },
            Command::Reset => Action::ResetConfiguration,
            Command::Dismiss(id) => Action::DismissNotice(id),
            Command::Chat(text) => Action::SendChat { text },
            Command::Reconnect
            | Command::Show(_)
            | Command::Help
            | Command::Quit
            | Command::Unknown(_) => return None,
        };
        Some(action)
    }
}

/// Error parsing a command
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Empty input
    Empty,
    /// A required argument is missing
    MissingArgument(&'static str),
    /// Repository arguments do not describe a repository
    InvalidRepository(RepositoryError),
    /// Invalid syntax
    InvalidSyntax(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty input"),
            ParseError::MissingArgument(name) => write!(f, "missing argument: {}", name),
            ParseError::InvalidRepository(e) => write!(f, "invalid repository: {}", e),
            ParseError::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<RepositoryError> for ParseError {
    fn from(e: RepositoryError) -> Self {
        ParseError::InvalidRepository(e)
    }
}

/// Usage text shown by `/help`
pub const HELP: &str = "\
/config <gemini-token> [<repo-url> <github-token> [branch]]
/add <repo-url> <github-token> [branch]
/update <id> <repo-url> <github-token> [branch]
/delete <id>
/select <id>
/fetch <id>
/toggle <path>
/reset
/dismiss <notice-id>
/tree | /repos | /status
/reconnect
/quit
anything else is sent to the agent";

/// Parse an input line
///
/// # Examples
///
/// ```
/// use chatstack_client::commands::{parse_input, Command};
///
/// let cmd = parse_input("/select 42").unwrap();
/// assert_eq!(cmd, Command::Select { repository_id: "42".into() });
///
/// let cmd = parse_input("what does main.rs do?").unwrap();
/// assert!(matches!(cmd, Command::Chat(_)));
/// ```
pub fn parse_input(input: &str) -> Result<Command, ParseError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let Some(body) = input.strip_prefix('/') else {
        return Ok(Command::Chat(input.to_string()));
    };

    let (name, rest) = split_first_token(body);
    let name = name.to_lowercase();
    let args: Vec<&str> = rest.split_whitespace().collect();

    match name.as_str() {
        "config" => {
            let gemini_token = required(&args, 0, "gemini-token")?.to_string();
            let repository = if args.len() > 1 {
                Some(parse_repository(&args[1..])?)
            } else {
                None
            };
            Ok(Command::Config {
                gemini_token,
                repository,
            })
        }
        "add" => Ok(Command::Add(parse_repository(&args)?)),
        "update" => {
            let repository_id = required(&args, 0, "id")?.to_string();
            let repository = parse_repository(&args[1..])?;
            Ok(Command::Update {
                repository_id,
                repository,
            })
        }
        "delete" => Ok(Command::Delete {
            repository_id: required(&args, 0, "id")?.to_string(),
        }),
        "select" => Ok(Command::Select {
            repository_id: required(&args, 0, "id")?.to_string(),
        }),
        "fetch" => Ok(Command::Fetch {
            repository_id: required(&args, 0, "id")?.to_string(),
        }),
        "toggle" => {
            let path = rest.trim();
            if path.is_empty() {
                return Err(ParseError::MissingArgument("path"));
            }
            Ok(Command::Toggle {
                path: path.to_string(),
            })
        }
        "dismiss" => {
            let raw = required(&args, 0, "notice-id")?;
            let id = raw
                .parse()
                .map_err(|_| ParseError::InvalidSyntax(format!("'{}' is not a notice id", raw)))?;
            Ok(Command::Dismiss(id))
        }
        "reset" => Ok(Command::Reset),
        "reconnect" => Ok(Command::Reconnect),
        "tree" => Ok(Command::Show(Panel::Tree)),
        "repos" | "repositories" => Ok(Command::Show(Panel::Repositories)),
        "status" => Ok(Command::Show(Panel::Status)),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        "" => Err(ParseError::InvalidSyntax("missing command name".to_string())),
        _ => Ok(Command::Unknown(name)),
    }
}

/// `<repo-url> <github-token> [branch]`
fn parse_repository(args: &[&str]) -> Result<Repository, ParseError> {
    let url = required(args, 0, "repo-url")?;
    let token = required(args, 1, "github-token")?;
    let branch = args.get(2).copied();
    Ok(Repository::from_url(url, Some(token.to_string()), branch)?)
}

fn required<'a>(args: &[&'a str], index: usize, name: &'static str) -> Result<&'a str, ParseError> {
    args.get(index)
        .copied()
        .ok_or(ParseError::MissingArgument(name))
}

/// Split the first whitespace-delimited token from a string
fn split_first_token(input: &str) -> (&str, &str) {
    if let Some(pos) = input.find(char::is_whitespace) {
        (&input[..pos], &input[pos..])
    } else {
        (input, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Chat ====================

    #[test]
    fn test_plain_text_is_chat() {
        assert_eq!(
            parse_input("  explain src/lib.rs  ").unwrap(),
            Command::Chat("explain src/lib.rs".into())
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_input("   "), Err(ParseError::Empty));
    }

    // ==================== Repository commands ====================

    #[test]
    fn test_add_with_branch() {
        match parse_input("/add https://github.com/octo/app.git ghp_x dev").unwrap() {
            Command::Add(repo) => {
                assert_eq!(repo.owner, "octo");
                assert_eq!(repo.repo, "app");
                assert_eq!(repo.branch, "dev");
                assert_eq!(repo.token.as_deref(), Some("ghp_x"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_add_defaults_branch() {
        match parse_input("/add https://github.com/octo/app ghp_x").unwrap() {
            Command::Add(repo) => assert_eq!(repo.branch, "main"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_add_missing_token() {
        assert_eq!(
            parse_input("/add https://github.com/octo/app"),
            Err(ParseError::MissingArgument("github-token"))
        );
    }

    #[test]
    fn test_add_invalid_url() {
        assert!(matches!(
            parse_input("/add not-a-url ghp_x"),
            Err(ParseError::InvalidRepository(_))
        ));
    }

    #[test]
    fn test_update_and_delete() {
        match parse_input("/update r1 https://github.com/octo/app ghp_x").unwrap() {
            Command::Update { repository_id, .. } => assert_eq!(repository_id, "r1"),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(
            parse_input("/DELETE r1").unwrap(),
            Command::Delete {
                repository_id: "r1".into()
            }
        );
        assert_eq!(
            parse_input("/delete"),
            Err(ParseError::MissingArgument("id"))
        );
    }

    // ==================== Config ====================

    #[test]
    fn test_config_token_only() {
        assert_eq!(
            parse_input("/config gem-123").unwrap(),
            Command::Config {
                gemini_token: "gem-123".into(),
                repository: None
            }
        );
    }

    #[test]
    fn test_config_with_repository_into_action() {
        let action = parse_input("/config gem https://github.com/octo/app ghp_x")
            .unwrap()
            .into_action()
            .unwrap();
        match action {
            Action::SubmitConfig(config) => {
                assert_eq!(config.gemini_token, "gem");
                assert_eq!(config.repositories.len(), 1);
                assert_eq!(config.repositories[0].name, "octo/app");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    // ==================== Selection and session ====================

    #[test]
    fn test_toggle_keeps_path_with_spaces() {
        assert_eq!(
            parse_input("/toggle docs/My Notes.md").unwrap(),
            Command::Toggle {
                path: "docs/My Notes.md".into()
            }
        );
    }

    #[test]
    fn test_dismiss_requires_number() {
        assert_eq!(parse_input("/dismiss 3").unwrap(), Command::Dismiss(3));
        assert!(matches!(
            parse_input("/dismiss three"),
            Err(ParseError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_client_only_commands_have_no_action() {
        for input in ["/quit", "/reconnect", "/help", "/tree", "/frobnicate"] {
            assert!(parse_input(input).unwrap().into_action().is_none(), "{input}");
        }
        assert_eq!(
            parse_input("/frobnicate").unwrap(),
            Command::Unknown("frobnicate".into())
        );
    }

    #[test]
    fn test_show_panels() {
        assert_eq!(parse_input("/tree").unwrap(), Command::Show(Panel::Tree));
        assert_eq!(
            parse_input("/repos").unwrap(),
            Command::Show(Panel::Repositories)
        );
        assert_eq!(parse_input("/status").unwrap(), Command::Show(Panel::Status));
    }

    #[test]
    fn test_bare_slash() {
        assert!(matches!(parse_input("/"), Err(ParseError::InvalidSyntax(_))));
    }

    #[test]
    fn test_reset_maps_to_action() {
        assert_eq!(
            parse_input("/reset").unwrap().into_action(),
            Some(Action::ResetConfiguration)
        );
    }
}
