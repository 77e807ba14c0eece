//! Golden vectors for subject matching and policy evaluation.
//!
//! These pin the wildcard rules the server applies, so a change to the
//! matcher that would silently widen or narrow a role shows up here.

use natsctl_perms::subject_matches;

/// A pattern/subject pair and whether the pattern covers the subject.
#[derive(Debug, Clone, Copy)]
pub struct MatchVector {
    pub pattern: &'static str,
    pub subject: &'static str,
    pub expected: bool,
}

const fn vector(pattern: &'static str, subject: &'static str, expected: bool) -> MatchVector {
    MatchVector {
        pattern,
        subject,
        expected,
    }
}

/// Get all subject matching vectors.
pub fn match_vectors() -> Vec<MatchVector> {
    vec![
        vector("jobs.created", "jobs.created", true),
        vector("jobs.created", "jobs.deleted", false),
        vector("jobs.*", "jobs.created", true),
        vector("jobs.*", "jobs.created.eu", false),
        vector("jobs.*", "jobs", false),
        vector("jobs.>", "jobs.created", true),
        vector("jobs.>", "jobs.created.eu", true),
        vector("jobs.>", "jobs", false),
        vector(">", "anything.at.all", true),
        vector("*.created", "jobs.created", true),
        vector("*.created", "jobs.deleted", false),
        // Subscriptions with wildcards are covered only by wider patterns.
        vector("jobs.>", "jobs.*", true),
        vector("jobs.*", "jobs.>", false),
        vector("jobs.*", "jobs.*", true),
        vector("_INBOX.>", "_INBOX.abc.def", true),
        vector("_INBOX.>", "_PRIV_INBOX.abc.def", false),
    ]
}

/// Evaluate every vector, returning `(pattern, subject, passed)`.
pub fn verify_match_vectors() -> Vec<(&'static str, &'static str, bool)> {
    match_vectors()
        .into_iter()
        .map(|v| {
            let passed = subject_matches(v.pattern, v.subject) == v.expected;
            (v.pattern, v.subject, passed)
        })
        .collect()
}
