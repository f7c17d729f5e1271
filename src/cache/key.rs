//! Query identity: resource kind plus ordered parameters.

use std::borrow::Cow;
use std::fmt;

/// Resource kind for pages of the user collection.
pub const USERS: &str = "users";

/// Resource kind for a single user.
pub const USER: &str = "user";

/// One parameter of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyParam {
    Int(i64),
    Str(String),
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for KeyParam {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for KeyParam {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for KeyParam {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for KeyParam {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Identity of a cacheable request.
///
/// Two keys are equal iff the resource kind and every parameter are equal by
/// value, so `("users", [1])` and `("users", ["1"])` are different keys.
///
/// # Examples
///
/// ```
/// use rquery::cache::QueryKey;
///
/// let key = QueryKey::users_page(2);
/// assert_eq!(key, QueryKey::new("users").param(2u32));
/// assert_eq!(key.to_string(), "users/2");
/// assert_ne!(key, QueryKey::user("2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    kind: Cow<'static, str>,
    params: Vec<KeyParam>,
}

impl QueryKey {
    /// Creates a key with no parameters.
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: kind.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, value: impl Into<KeyParam>) -> Self {
        self.params.push(value.into());
        self
    }

    /// `("users", [page])`.
    pub fn users_page(page: u32) -> Self {
        Self::new(USERS).param(page)
    }

    /// `("user", [id])`.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(USER).param(id.into())
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &[KeyParam] {
        &self.params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        for param in &self.params {
            write!(f, "/{param}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equality_is_by_value() {
        assert_eq!(QueryKey::user("u1"), QueryKey::new(String::from("user")).param("u1"));
        assert_ne!(QueryKey::users_page(1), QueryKey::users_page(2));
        assert_ne!(
            QueryKey::new("users").param(1u32),
            QueryKey::new("users").param("1")
        );
    }

    #[test]
    fn parameter_order_matters() {
        let a = QueryKey::new("search").param("ana").param(1u32);
        let b = QueryKey::new("search").param(1u32).param("ana");
        assert_ne!(a, b);
    }

    #[test]
    fn hashable() {
        let keys: HashSet<_> = [
            QueryKey::users_page(1),
            QueryKey::users_page(1),
            QueryKey::user("u1"),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn display() {
        assert_eq!(QueryKey::user("u1").to_string(), "user/u1");
        assert_eq!(QueryKey::new("users").to_string(), "users");
    }
}
