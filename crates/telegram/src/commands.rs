/// A `/name args` message split into its parts. The name is lowercased and
/// any `@botname` suffix is dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandText {
    pub name: String,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Update,
    Other(String),
}

impl BotCommand {
    pub fn from_name(name: &str) -> Self {
        match name {
            "start" => Self::Start,
            "update" => Self::Update,
            other => Self::Other(other.to_owned()),
        }
    }
}

pub fn parse_command_text(text: &str) -> Option<CommandText> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }

    Some(CommandText { name: name.to_ascii_lowercase(), args: args.to_owned() })
}
