use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend identifier for an account.
///
/// The API hands out numeric ids, but string ids are accepted too so a
/// backend migration does not break deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(untagged)]
pub enum AccountId {
    Number(i64),
    Text(String),
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountId::Number(n) => write!(f, "{}", n),
            AccountId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        AccountId::Number(id)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId::Text(id.to_string())
    }
}

/// Identity record returned by the backend.
///
/// Only `id` and `email` are interpreted here; every other profile field
/// is carried through untouched in `profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub profile: Map<String, Value>,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            profile: Map::new(),
        }
    }

    /// Look up an opaque profile field by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.profile.get(name)
    }
}

/// Body returned by every session-establishing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Account,
}
