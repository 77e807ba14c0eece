//! Validated entity names.
//!
//! Names end up as path segments in the claim store and credential tree, so
//! they are checked once at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

fn validate(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "must not be empty"
    } else if name != name.trim() {
        "must not have surrounding whitespace"
    } else if name.starts_with('.') {
        "must not start with '.'"
    } else if name.contains(['/', '\\']) {
        "must not contain path separators"
    } else if name.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(CoreError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

macro_rules! entity_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Result<Self> {
                let name = name.into();
                validate(&name)?;
                Ok(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<std::path::Path> for $name {
            fn as_ref(&self) -> &std::path::Path {
                std::path::Path::new(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }
    };
}

entity_name!(
    /// Name of an operator (the root of a trust chain).
    OperatorName
);
entity_name!(
    /// Name of an account under an operator.
    AccountName
);
entity_name!(
    /// Name of a role, i.e. the `role` of one scoped signing key.
    RoleName
);
entity_name!(
    /// Name of a user; also the credential bundle's file stem.
    UserName
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(AccountName::new("APP").unwrap().as_str(), "APP");
        assert!(UserName::new("worker-1").is_ok());
        assert!(RoleName::new("worker role").is_ok());
    }

    #[test]
    fn rejects_path_like_names() {
        for bad in ["", "  ", "../x", ".hidden", "a/b", "a\\b", " pad"] {
            assert!(OperatorName::new(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn serde_validates() {
        let ok: AccountName = serde_json::from_str("\"APP\"").unwrap();
        assert_eq!(ok.to_string(), "APP");
        assert!(serde_json::from_str::<AccountName>("\"a/b\"").is_err());
    }
}
