use serde::{Deserialize, Serialize};
use std::fmt;

/// A subscriber with a unique nickname and the email daily photos go to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub nickname: String,
    pub email: String,
}

impl User {
    pub fn new(nickname: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            email: email.into(),
        }
    }
}

/// The membership mutation a confirmation key stands for.
///
/// Serialized as `"ADD"` / `"DELETE"`; any other value found in the cache
/// means the entry was forged or corrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "DELETE")]
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Add => "ADD",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending membership mutation, cached under its confirmation key until
/// the user follows the emailed link or the entry expires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub user: User,
    pub method: Method,
}

impl Operation {
    pub fn new(user: User, method: Method) -> Self {
        Self { user, method }
    }
}
