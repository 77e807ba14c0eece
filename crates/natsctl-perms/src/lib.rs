//! # natsctl perms
//!
//! The permission template engine for scoped signing keys.
//!
//! ## Overview
//!
//! Every role of an account is a scoped signing key carrying a permission
//! template. Users signed with that key get exactly the template as their
//! permissions. [`derive_template`] turns the allow-lists an operator enters
//! into a template that denies by default, wires up the user's private reply
//! inbox and keeps scoped users off the shared inbox.
//!
//! ## Key Types
//!
//! - [`TemplateInput`] - publish/subscribe allow-lists plus the reply flag
//! - [`derive_template`] - the derivation rules
//! - [`Policy`] - evaluates a user's permissions against concrete subjects
//!
//! ## Usage
//!
//! ```ignore
//! let input = TemplateInput::new(vec!["jobs.>".into()], vec![], false)?;
//! let template = derive_template(input);
//! let policy = Policy::new(&template, &user_public_key);
//! assert!(policy.can_publish("jobs.created"));
//! ```

pub mod error;
pub mod policy;
pub mod subject;
pub mod template;

pub use error::{PermsError, Result};
pub use policy::Policy;
pub use subject::{parse_subject_lines, subject_matches, validate_subject};
pub use template::{
    default_response_permission, derive_template, inbox_prefix, TemplateInput,
    PRIVATE_INBOX_SELECTOR, SHARED_INBOX,
};
