//! Chat command grammar.
//!
//! Every line a user types in the channel or in a private message goes
//! through [`Command::parse`]. Lines that are not commands (ordinary chat,
//! unknown `!words`) parse to `Ok(None)` and are ignored. A recognised
//! command with bad arguments is a [`ProtocolError::Usage`] carrying the
//! usage line, which the caller sends back to the requester verbatim.
//!
//! ```text
//! !start [category...]          !join          !a <label>
//! !leaderboard   !categories    !help
//! !admin verify [password]      !admin logout
//! !admin stop_game              !admin set_rate_limit [seconds]
//! !admin stats                  !admin msg <target> <text...>
//! !admin add_admin <nick> [password]
//! !admin remove_admin <nick>    !admin set_password <nick> <password>
//! !admin list_admins            !admin set_hostmasks <nick> <pattern...>
//! ```

use crate::{Identity, ProtocolError};

/// Category used when `!start` is given no argument.
pub const DEFAULT_CATEGORY: &str = "random";

const ANSWER_USAGE: &str = "!a <label>";
const ADMIN_USAGE: &str = "!admin <verify|logout|stop_game|set_rate_limit|stats|msg|add_admin|remove_admin|set_password|list_admins|set_hostmasks> [args]";
const RATE_USAGE: &str = "!admin set_rate_limit [seconds]";
const MSG_USAGE: &str = "!admin msg <#channel|nick> <text>";
const ADD_USAGE: &str = "!admin add_admin <nick> [password]";
const REMOVE_USAGE: &str = "!admin remove_admin <nick>";
const SET_PASSWORD_USAGE: &str = "!admin set_password <nick> <password>";
const HOSTMASK_USAGE: &str = "!admin set_hostmasks <nick> <pattern...>";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a round in the given category.
    Start { category: String },
    Join,
    /// Submit an answer label for the open question.
    Answer { label: String },
    Leaderboard,
    Categories,
    Help,
    /// Establish an admin session. The password is optional because
    /// hostmask and registrar verification need none.
    AdminVerify { password: Option<String> },
    AdminLogout,
    /// Any admin command that requires an authorized caller.
    Admin(AdminAction),
}

/// Where an admin `msg` should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SayTarget {
    /// A channel, written with its leading `#`.
    Channel(String),
    User(Identity),
}

/// Admin operations gated by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    StopRound,
    /// `None` reports the current cooldown without changing it.
    SetRateLimit(Option<u64>),
    Stats,
    Say { target: SayTarget, text: String },
    AddAdmin {
        identity: Identity,
        password: Option<String>,
    },
    RemoveAdmin { identity: Identity },
    SetPassword { identity: Identity, password: String },
    ListAdmins,
    SetHostmasks {
        identity: Identity,
        patterns: Vec<String>,
    },
}

impl AdminAction {
    /// Short name for logs. Never includes arguments, which may hold
    /// passwords.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StopRound => "stop_game",
            Self::SetRateLimit(_) => "set_rate_limit",
            Self::Stats => "stats",
            Self::Say { .. } => "msg",
            Self::AddAdmin { .. } => "add_admin",
            Self::RemoveAdmin { .. } => "remove_admin",
            Self::SetPassword { .. } => "set_password",
            Self::ListAdmins => "list_admins",
            Self::SetHostmasks { .. } => "set_hostmasks",
        }
    }

    /// Read-only actions have no round or credential side effects.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Stats | Self::ListAdmins | Self::SetRateLimit(None))
    }
}

impl Command {
    /// Parses one line of chat.
    ///
    /// # Errors
    /// [`ProtocolError::Usage`] when a known command has missing or
    /// malformed arguments.
    pub fn parse(line: &str) -> Result<Option<Self>, ProtocolError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head.to_ascii_lowercase().as_str() {
            "!start" => Command::Start {
                category: if rest.is_empty() {
                    DEFAULT_CATEGORY.to_string()
                } else {
                    rest.join(" ")
                },
            },
            "!join" => Command::Join,
            "!a" => match rest.as_slice() {
                [label] => Command::Answer {
                    label: (*label).to_string(),
                },
                _ => return Err(ProtocolError::Usage(ANSWER_USAGE)),
            },
            "!leaderboard" => Command::Leaderboard,
            "!categories" => Command::Categories,
            "!help" => Command::Help,
            "!admin" => parse_admin(&rest)?,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn parse_admin(args: &[&str]) -> Result<Command, ProtocolError> {
    let Some((sub, args)) = args.split_first() else {
        return Err(ProtocolError::Usage(ADMIN_USAGE));
    };

    let action = match sub.to_ascii_lowercase().as_str() {
        "verify" => {
            return Ok(Command::AdminVerify {
                password: args.first().map(|p| (*p).to_string()),
            });
        }
        "logout" => return Ok(Command::AdminLogout),
        "stop_game" => AdminAction::StopRound,
        "stats" => AdminAction::Stats,
        "list_admins" => AdminAction::ListAdmins,
        "set_rate_limit" => match args {
            [] => AdminAction::SetRateLimit(None),
            [secs] => AdminAction::SetRateLimit(Some(
                secs.parse().map_err(|_| ProtocolError::Usage(RATE_USAGE))?,
            )),
            _ => return Err(ProtocolError::Usage(RATE_USAGE)),
        },
        "msg" => match args {
            [target, text @ ..] if !text.is_empty() => AdminAction::Say {
                target: parse_target(target, MSG_USAGE)?,
                text: text.join(" "),
            },
            _ => return Err(ProtocolError::Usage(MSG_USAGE)),
        },
        "add_admin" => match args {
            [nick] => AdminAction::AddAdmin {
                identity: identity_arg(nick, ADD_USAGE)?,
                password: None,
            },
            [nick, password] => AdminAction::AddAdmin {
                identity: identity_arg(nick, ADD_USAGE)?,
                password: Some((*password).to_string()),
            },
            _ => return Err(ProtocolError::Usage(ADD_USAGE)),
        },
        "remove_admin" => match args {
            [nick] => AdminAction::RemoveAdmin {
                identity: identity_arg(nick, REMOVE_USAGE)?,
            },
            _ => return Err(ProtocolError::Usage(REMOVE_USAGE)),
        },
        "set_password" => match args {
            [nick, password] => AdminAction::SetPassword {
                identity: identity_arg(nick, SET_PASSWORD_USAGE)?,
                password: (*password).to_string(),
            },
            _ => return Err(ProtocolError::Usage(SET_PASSWORD_USAGE)),
        },
        "set_hostmasks" => match args {
            [nick, patterns @ ..] if !patterns.is_empty() => AdminAction::SetHostmasks {
                identity: identity_arg(nick, HOSTMASK_USAGE)?,
                patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            },
            _ => return Err(ProtocolError::Usage(HOSTMASK_USAGE)),
        },
        _ => return Err(ProtocolError::Usage(ADMIN_USAGE)),
    };
    Ok(Command::Admin(action))
}

fn identity_arg(raw: &str, usage: &'static str) -> Result<Identity, ProtocolError> {
    Identity::new(raw).map_err(|_| ProtocolError::Usage(usage))
}

fn parse_target(raw: &str, usage: &'static str) -> Result<SayTarget, ProtocolError> {
    if raw.starts_with('#') {
        Ok(SayTarget::Channel(raw.to_string()))
    } else {
        identity_arg(raw, usage).map(SayTarget::User)
    }
}
