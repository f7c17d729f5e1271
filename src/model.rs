//! Records served by the user-listing API.

use serde::{Deserialize, Serialize};

/// One row of the user table.
///
/// Server-assigned and immutable from the client's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: String,
}

impl UserSummary {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            created_at: created_at.into(),
        }
    }
}

/// One page of users plus the size of the whole collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub users: Vec<UserSummary>,
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}

impl Page {
    pub fn new(users: Vec<UserSummary>, total_count: u64) -> Self {
        Self { users, total_count }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
