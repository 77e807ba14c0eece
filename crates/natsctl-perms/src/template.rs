//! Role template derivation.
//!
//! A role's template is derived from two allow-lists and a reply flag:
//!
//! 1. empty publish allow-list: deny publishing to everything;
//! 2. the private inbox pattern is appended to the subscribe allow-list;
//! 3. the shared `_INBOX.>` namespace is denied on subscribe;
//! 4. a subscribe allow-list that is still empty after (2) denies everything;
//! 5. replies, when allowed, are limited to one message within ten minutes.
//!
//! Rule 4 is evaluated after the private inbox was added, so in practice the
//! subscribe deny-list is just the shared inbox and the private inbox stays
//! reachable.

use std::time::Duration;

use natsctl_core::{Permission, PublicKey, ResponsePermission, Template, DENY_ALL};

use crate::error::Result;
use crate::subject::validate_subject;

/// Subscribe pattern for a user's private inbox; `{{subject()}}` expands to
/// the user's public identifier when the server applies the template.
pub const PRIVATE_INBOX_SELECTOR: &str = "_PRIV_INBOX.{{subject()}}.>";

/// The shared inbox namespace that scoped users may not listen on.
pub const SHARED_INBOX: &str = "_INBOX.>";

/// Replies allowed per request when replies are enabled.
pub const DEFAULT_REPLY_MAX_MSGS: i64 = 1;

/// How long after a request a reply is allowed.
pub const DEFAULT_REPLY_TTL: Duration = Duration::from_secs(10 * 60);

/// The client-side inbox prefix for a user, matching [`PRIVATE_INBOX_SELECTOR`].
pub fn inbox_prefix(user: &PublicKey) -> String {
    format!("_PRIV_INBOX.{user}")
}

/// The default response permission granted when replies are allowed.
pub fn default_response_permission() -> ResponsePermission {
    ResponsePermission {
        max_msgs: DEFAULT_REPLY_MAX_MSGS,
        expires: DEFAULT_REPLY_TTL,
    }
}

/// User supplied policy for a role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateInput {
    pub pub_allow: Vec<String>,
    pub sub_allow: Vec<String>,
    pub allow_reply: bool,
}

impl TemplateInput {
    /// Build an input, validating every subject.
    pub fn new(pub_allow: Vec<String>, sub_allow: Vec<String>, allow_reply: bool) -> Result<Self> {
        for subject in pub_allow.iter().chain(&sub_allow) {
            validate_subject(subject)?;
        }
        Ok(Self {
            pub_allow,
            sub_allow,
            allow_reply,
        })
    }

    /// Recover the input an existing template was derived from, for editing.
    pub fn from_template(template: &Template) -> Self {
        Self {
            pub_allow: template.publish.allow.clone(),
            sub_allow: template
                .subscribe
                .allow
                .iter()
                .filter(|subject| *subject != PRIVATE_INBOX_SELECTOR)
                .cloned()
                .collect(),
            allow_reply: template.resp.is_some(),
        }
    }
}

/// Derive a role template. See the module docs for the rules.
pub fn derive_template(input: TemplateInput) -> Template {
    let mut publish = Permission::allow(input.pub_allow);
    if publish.allow.is_empty() {
        publish.deny = vec![DENY_ALL.to_string()];
    }

    let mut subscribe = Permission::allow(input.sub_allow);
    subscribe.allow.push(PRIVATE_INBOX_SELECTOR.to_string());
    subscribe.deny = vec![SHARED_INBOX.to_string()];
    if subscribe.allow.is_empty() {
        subscribe.deny.push(DENY_ALL.to_string());
    }

    let resp = input.allow_reply.then(default_response_permission);

    Template {
        publish,
        subscribe,
        resp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natsctl_core::{KeyKind, KeyPair};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn worker_role_from_scenario() {
        let template = derive_template(TemplateInput {
            pub_allow: strings(&["jobs.>"]),
            sub_allow: vec![],
            allow_reply: false,
        });
        assert_eq!(template.publish.allow, vec!["jobs.>"]);
        assert!(template.publish.deny.is_empty());
        assert_eq!(template.subscribe.allow, vec![PRIVATE_INBOX_SELECTOR]);
        assert_eq!(template.subscribe.deny, vec![SHARED_INBOX]);
        assert!(template.resp.is_none());
    }

    #[test]
    fn empty_publish_with_reply_stays_contradictory() {
        let template = derive_template(TemplateInput {
            pub_allow: vec![],
            sub_allow: vec![],
            allow_reply: true,
        });
        assert_eq!(template.publish.deny, vec![DENY_ALL]);
        assert_eq!(template.subscribe.allow, vec![PRIVATE_INBOX_SELECTOR]);
        assert!(template.subscribe.deny.contains(&SHARED_INBOX.to_string()));
        assert_eq!(template.resp, Some(default_response_permission()));
    }

    #[test]
    fn reply_permission_is_single_message_ten_minutes() {
        let resp = default_response_permission();
        assert_eq!(resp.max_msgs, 1);
        assert_eq!(resp.expires, Duration::from_secs(600));
    }

    #[test]
    fn from_template_strips_private_inbox() {
        let input = TemplateInput {
            pub_allow: strings(&["a.>"]),
            sub_allow: strings(&["b.*"]),
            allow_reply: true,
        };
        let template = derive_template(input.clone());
        assert_eq!(TemplateInput::from_template(&template), input);
    }

    #[test]
    fn rederiving_an_edit_does_not_duplicate_inbox() {
        let first = derive_template(TemplateInput::new(strings(&["a"]), vec![], false).unwrap());
        let second = derive_template(TemplateInput::from_template(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn new_validates_subjects() {
        assert!(TemplateInput::new(strings(&["a b"]), vec![], false).is_err());
        assert!(TemplateInput::new(vec![], strings(&["a.>.b"]), false).is_err());
    }

    #[test]
    fn inbox_prefix_uses_public_identifier() {
        let user = KeyPair::generate(KeyKind::User).public_key();
        let prefix = inbox_prefix(&user);
        assert_eq!(prefix, format!("_PRIV_INBOX.{}", user.encode()));
        assert_eq!(
            PRIVATE_INBOX_SELECTOR.replace("{{subject()}}", &user.encode()),
            format!("{prefix}.>")
        );
    }
}
