//! Bootstrap configuration for a NATS server using the full account resolver.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Everything a server needs to trust an operator and find its system account.
#[derive(Debug, Clone)]
pub struct ServerConfig<'a> {
    pub operator_name: &'a str,
    pub operator_jwt: &'a str,
    pub system_account: &'a str,
    pub system_account_jwt: &'a str,
}

impl ServerConfig<'_> {
    pub fn render(&self) -> String {
        format!(
            r#"# Operator named {operator_name}
operator: {operator_jwt}
# System Account named SYS
system_account: {system_account}

# configuration of the nats based resolver
resolver {{
    type: full
    # Directory in which the account jwt will be stored
    dir: './jwt'
    # Deleted jwt are renamed with a .delete suffix when enabled
    allow_delete: false
    # Interval at which resolvers in a cluster compare and exchange jwt
    interval: "2m"
    # Timeout for lookup requests in case an account does not exist locally
    timeout: "1.9s"
}}

# Preload the resolver with the system account jwt.
# Later changes to the system account take precedence over this entry.
resolver_preload: {{
    {system_account}: {system_account_jwt},
}}
"#,
            operator_name = self.operator_name,
            operator_jwt = self.operator_jwt,
            system_account = self.system_account,
            system_account_jwt = self.system_account_jwt,
        )
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        tracing::info!(path = %path.display(), "server configuration written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_operator_and_preload() {
        let config = ServerConfig {
            operator_name: "ROOT_TEST",
            operator_jwt: "op.jwt.sig",
            system_account: "ASYS",
            system_account_jwt: "sys.jwt.sig",
        };
        let text = config.render();
        assert!(text.contains("# Operator named ROOT_TEST\noperator: op.jwt.sig\n"));
        assert!(text.contains("system_account: ASYS\n"));
        assert!(text.contains("type: full"));
        assert!(text.contains("dir: './jwt'"));
        assert!(text.contains("allow_delete: false"));
        assert!(text.contains(r#"interval: "2m""#));
        assert!(text.contains(r#"timeout: "1.9s""#));
        assert!(text.contains("    ASYS: sys.jwt.sig,\n"));
    }

    #[test]
    fn write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsc/config-OP.cfg");
        let config = ServerConfig {
            operator_name: "OP",
            operator_jwt: "a.b.c",
            system_account: "ASYS",
            system_account_jwt: "d.e.f",
        };
        config.write(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), config.render());
    }
}
