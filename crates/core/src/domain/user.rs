use serde::{Deserialize, Serialize};

/// Sender of an inbound message or button click.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl ChatUser {
    /// `"{first} {last}"`, with blank parts kept so the separator is always
    /// present.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name.as_deref().unwrap_or_default())
    }
}

/// Usernames allowed to reload the FAQ content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    usernames: Vec<String>,
}

impl AdminAllowList {
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let usernames = usernames
            .into_iter()
            .map(|name| normalize_username(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        Self { usernames }
    }

    /// Parses a comma separated list such as `"alice, bob ,@carol"`.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn is_admin(&self, user: &ChatUser) -> bool {
        user.username
            .as_deref()
            .is_some_and(|username| self.usernames.iter().any(|admin| admin == username))
    }

    pub fn usernames(&self) -> &[String] {
        &self.usernames
    }
}

fn normalize_username(raw: &str) -> String {
    let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    compact.trim_start_matches('@').to_owned()
}
