//! The NATS credentials file format.

use zeroize::Zeroizing;

use crate::error::{CoreError, Result};

const JWT_BEGIN: &str = "-----BEGIN NATS USER JWT-----";
const JWT_END: &str = "------END NATS USER JWT------";
const SEED_BEGIN: &str = "-----BEGIN USER NKEY SEED-----";
const SEED_END: &str = "------END USER NKEY SEED------";

/// A parsed credentials bundle.
pub struct UserConfig {
    pub jwt: String,
    pub seed: Zeroizing<String>,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("jwt", &self.jwt)
            .field("seed", &"<redacted>")
            .finish()
    }
}

/// Render a user token and seed as a `.creds` file.
pub fn format_user_config(jwt: &str, seed: &str) -> Zeroizing<String> {
    Zeroizing::new(format!(
        "{JWT_BEGIN}
{jwt}
{JWT_END}

************************* IMPORTANT *************************
NKEY Seed printed below can be used to sign and prove identity.
NKEYs are sensitive and should be treated as secrets.

{SEED_BEGIN}
{seed}
{SEED_END}

*************************************************************
"
    ))
}

/// Parse a `.creds` file back into its token and seed.
pub fn parse_user_config(text: &str) -> Result<UserConfig> {
    let jwt = block(text, JWT_BEGIN)
        .ok_or_else(|| CoreError::MalformedCredentials("missing user JWT".to_string()))?;
    let seed = block(text, SEED_BEGIN)
        .ok_or_else(|| CoreError::MalformedCredentials("missing user seed".to_string()))?;
    Ok(UserConfig {
        jwt: jwt.to_string(),
        seed: Zeroizing::new(seed.to_string()),
    })
}

/// First non-empty line after `marker`.
fn block<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let mut lines = text.lines().skip_while(|line| line.trim() != marker);
    lines.next()?;
    lines
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| !line.starts_with("---"))
}
