//! Evaluating permissions for a concrete identity.

use natsctl_core::{Permission, Permissions, PublicKey};

use crate::subject::subject_matches;

const SUBJECT_PLACEHOLDER: &str = "{{subject()}}";

/// Effective permissions of one user, with template placeholders expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    publish: Permission,
    subscribe: Permission,
    allow_reply: bool,
}

impl Policy {
    pub fn new(permissions: &Permissions, user: &PublicKey) -> Self {
        let subject = user.encode();
        Self {
            publish: expand(&permissions.publish, &subject),
            subscribe: expand(&permissions.subscribe, &subject),
            allow_reply: permissions.resp.is_some(),
        }
    }

    pub fn can_publish(&self, subject: &str) -> bool {
        allowed(&self.publish, subject)
    }

    pub fn can_subscribe(&self, subject: &str) -> bool {
        allowed(&self.subscribe, subject)
    }

    /// Whether the user may answer requests it receives.
    pub fn can_reply(&self) -> bool {
        self.allow_reply
    }
}

fn expand(permission: &Permission, subject: &str) -> Permission {
    let expand_all = |patterns: &[String]| -> Vec<String> {
        patterns
            .iter()
            .map(|p| p.replace(SUBJECT_PLACEHOLDER, subject))
            .collect()
    };
    Permission {
        allow: expand_all(&permission.allow),
        deny: expand_all(&permission.deny),
    }
}

/// Deny overrides allow; an empty allow-list allows everything not denied.
fn allowed(permission: &Permission, subject: &str) -> bool {
    let allowed = permission.allow.is_empty()
        || permission.allow.iter().any(|p| subject_matches(p, subject));
    let denied = permission.deny.iter().any(|p| subject_matches(p, subject));
    allowed && !denied
}
