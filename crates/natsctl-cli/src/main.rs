use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use natsctl::core::{AccountName, OperatorName, PublicKey, RoleName, UserName};
use natsctl::perms::{parse_subject_lines, TemplateInput};
use natsctl::store::{ClaimStore, ClaimStoreExt};
use natsctl::vault::MasterIdentity;
use natsctl::{Config, Ctl, MasterPasswordConfig, CONFIG_FILE, MASTER_KEY_ENV};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "natsctl")]
#[command(about = "Manage NATS operators, accounts, roles and users with sealed nkeys")]
struct Cli {
    /// Directory holding natsctl.json.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    #[arg(long, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write natsctl.json and print a fresh master identity.
    ConfigInit {
        /// Load the master secret from this Bitwarden entry instead of the environment.
        #[arg(long)]
        bitwarden_entry: Option<String>,
        /// Environment variable holding the master secret.
        #[arg(long, default_value = MASTER_KEY_ENV)]
        variable: String,
        #[arg(long, default_value = "nsc")]
        root: PathBuf,
    },
    /// Create an operator with its signing key and system account.
    InitOperator {
        #[arg(long, env = "OPERATOR_NAME")]
        operator: OperatorName,
        /// Comma separated tls:// or nats:// URLs.
        #[arg(long, env = "NATS_SERVER_URL")]
        server_url: String,
        /// Defaults to the server URLs with tls:// replaced by nats://.
        #[arg(long, env = "ACCOUNT_SERVER_URL")]
        account_server_url: Option<String>,
    },
    /// Create or update an account.
    Account {
        #[command(flatten)]
        target: AccountTarget,
        #[arg(long, env = "ACCOUNT_DESCRIPTION")]
        description: Option<String>,
    },
    /// Create or edit a role (scoped signing key) of an account.
    ScopedSigningKey(RoleArgs),
    /// Issue user credentials for a role.
    User {
        #[command(flatten)]
        target: AccountTarget,
        #[arg(long, env = "ROLE_NAME")]
        role: RoleName,
        #[arg(long, env = "USER_NAME")]
        user: UserName,
    },
    /// Issue a temporary admin user allowed on every subject, valid for 24 hours.
    AdminUser {
        #[command(flatten)]
        target: AccountTarget,
    },
    /// Push account claims to the cluster.
    Push {
        #[arg(long, env = "OPERATOR_NAME")]
        operator: Option<OperatorName>,
    },
    /// Pull account claims from the cluster.
    Pull {
        #[arg(long, env = "OPERATOR_NAME")]
        operator: Option<OperatorName>,
    },
    /// Print the seed of a sealed key.
    DecryptNkey {
        #[arg(long, env = "NKEY")]
        key: String,
    },
    /// Remove all operators, accounts, users and keys.
    Nuke {
        /// Confirm the removal.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
struct AccountTarget {
    #[arg(long, env = "OPERATOR_NAME")]
    operator: Option<OperatorName>,
    #[arg(long, env = "ACCOUNT_NAME")]
    account: AccountName,
}

#[derive(Debug, Args)]
struct RoleArgs {
    #[command(flatten)]
    target: AccountTarget,
    #[arg(long, env = "ROLE_NAME")]
    role: RoleName,
    /// Subject the role may publish to. Repeatable.
    #[arg(long = "pub", value_name = "SUBJECT")]
    publish: Vec<String>,
    /// Subject the role may subscribe to. Repeatable.
    #[arg(long = "sub", value_name = "SUBJECT")]
    subscribe: Vec<String>,
    /// File with one publish subject per line.
    #[arg(long)]
    pub_file: Option<PathBuf>,
    /// File with one subscribe subject per line.
    #[arg(long)]
    sub_file: Option<PathBuf>,
    /// Allow users of the role to answer requests.
    #[arg(long)]
    allow_reply: bool,
    /// Add to the role's current subjects instead of replacing them.
    #[arg(long)]
    extend: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.command {
        Command::ConfigInit {
            bitwarden_entry,
            variable,
            root,
        } => return config_init(&cli.dir, bitwarden_entry, variable, root),
        command => command,
    };

    let config = Config::load(&cli.dir)?;
    let mut ctl = Ctl::open(&cli.dir, &config);

    let result = tokio::select! {
        result = run(&mut ctl, command) => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("interrupted")),
    };

    cleanup(&ctl);
    result
}

/// Remove plaintext keys left behind by this or an earlier run.
fn cleanup<S: ClaimStore>(ctl: &Ctl<S>) {
    if std::env::var("SKIP_CLEANUP").as_deref() == Ok("1") {
        tracing::warn!("skipped cleanup of unencrypted keys");
        return;
    }
    match ctl.vault().sweep_unencrypted() {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "removed unencrypted keys"),
        Err(e) => tracing::warn!(error = %e, "cleanup of unencrypted keys failed"),
    }
}

fn config_init(
    dir: &Path,
    bitwarden_entry: Option<String>,
    variable: String,
    root: PathBuf,
) -> anyhow::Result<()> {
    let master_password = match bitwarden_entry {
        Some(entry_name) => MasterPasswordConfig::Bitwarden { entry_name },
        None => MasterPasswordConfig::EnvVar { variable },
    };
    let config = Config {
        root,
        master_password,
    };
    let path = config.write_new(dir)?;

    let identity = MasterIdentity::generate();
    println!("Wrote {}.", path.display());
    println!();
    println!("All nkeys are sealed to a single master identity. A fresh one:");
    println!();
    println!("    {}", identity.to_secret_string().as_str());
    println!();
    match &config.master_password {
        MasterPasswordConfig::EnvVar { variable } => {
            println!("Store it safely and export it as {variable} before running natsctl.");
        }
        MasterPasswordConfig::Bitwarden { entry_name } => {
            println!("Store it as the password of the Bitwarden entry {entry_name:?}.");
        }
    }
    Ok(())
}

async fn run<S: ClaimStore>(ctl: &mut Ctl<S>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::ConfigInit { .. } => bail!("{CONFIG_FILE} is handled before loading"),

        Command::InitOperator {
            operator,
            server_url,
            account_server_url,
        } => {
            let boot = ctl
                .init_operator(&operator, &server_url, account_server_url)
                .await?;
            let restore_path = ctl
                .vault()
                .unencrypted_path(&PublicKey::decode(&boot.root_public_key)?);
            println!("Operator {} created.", boot.operator);
            println!("Signing key:    {}", boot.signing_key);
            println!("System account: {}", boot.system_account);
            println!("Server config:  {}", boot.server_config.display());
            println!(
                r#"
    The public root key is: {public}
    Store the private root key safely. THIS PRINTOUT IS THE ONLY COPY.
    Keep these instructions with it.

    -----------------------------------------------
    This is the root key of the NATS operator {operator}.
    It is only needed if the operator signing key is compromised or lost;
    with it a new signing key can be issued without re-creating the cluster.
    To restore it, place it in the file {path}.

    PRIVATE ROOT KEY:

        {seed}

    -----------------------------------------------
"#,
                public = boot.root_public_key,
                operator = boot.operator,
                path = restore_path.display(),
                seed = boot.root_seed.as_str(),
            );
        }

        Command::Account {
            target,
            description,
        } => {
            let operator = ctl.choose_operator(target.operator).await?;
            let report = ctl
                .upsert_account(&operator, &target.account, description)
                .await?;
            let verb = if report.created { "Created" } else { "Updated" };
            println!("{verb} account {} ({}).", target.account, report.account);
            if let Some(key) = report.added_unscoped_key {
                println!("Added unscoped signing key {key} for admin users.");
            }
        }

        Command::ScopedSigningKey(args) => {
            let operator = ctl.choose_operator(args.target.operator.clone()).await?;
            let account = args.target.account.clone();
            let role = args.role.clone();

            let mut input = role_input(&args)?;
            if args.extend {
                let claims = ctl.store().read_account(&operator, &account).await?;
                if let Some(scope) = claims.nats.signing_keys.find_by_role(role.as_str()) {
                    let current = TemplateInput::from_template(&scope.template);
                    input = TemplateInput {
                        pub_allow: merge(current.pub_allow, input.pub_allow),
                        sub_allow: merge(current.sub_allow, input.sub_allow),
                        allow_reply: current.allow_reply || input.allow_reply,
                    };
                }
            }

            let report = ctl.upsert_role(&operator, &account, &role, input).await?;
            println!(
                "Role {role} of account {account} uses scoped signing key {}.",
                report.signing_key
            );
            let claims = ctl.store().read_account(&operator, &account).await?;
            if let Some(scope) = claims.nats.signing_keys.find_by_role(role.as_str()) {
                println!("{}", serde_json::to_string_pretty(&scope.template)?);
            }
            let roles = ctl.roles(&operator, &account).await?;
            println!("Roles of {account}: {}", roles.join(", "));
        }

        Command::User {
            target,
            role,
            user,
        } => {
            let operator = ctl.choose_operator(target.operator).await?;
            let issued = ctl
                .issue_user(&operator, &target.account, &role, &user)
                .await?;
            let creds = absolute(&issued.creds_path);
            println!("Created credentials: {}", creds.display());
            if let Some(prefix) = issued.inbox_prefix {
                println!("Inbox prefix: {prefix}");
                println!("Configure this inbox prefix in the client, e.g. nats --inbox-prefix={prefix}");
                println!(
                    "Kubernetes: kubectl create secret generic nats-creds --from-file=auth.creds={} --from-literal=NATS_INBOX_PREFIX={prefix}",
                    creds.display()
                );
            }
            if let Some(context) = issued.context {
                println!(
                    "Created nats context: {}. To select it, run nats context select",
                    context.display()
                );
            }
        }

        Command::AdminUser { target } => {
            let operator = ctl.choose_operator(target.operator).await?;
            let issued = ctl.issue_admin_user(&operator, &target.account).await?;
            println!(
                "Created admin credentials: {}",
                absolute(&issued.creds_path).display()
            );
            if let Some(exp) = issued.expires_at {
                println!("Valid until (unix time): {exp}");
            }
            if let Some(context) = issued.context {
                println!("Created and selected nats context: {}", context.display());
            }
        }

        Command::Push { operator } => {
            let operator = ctl.choose_operator(operator).await?;
            let report = ctl.push(&operator).await?;
            if let Some(e) = report.error {
                println!("Push failed: {e}");
            }
        }

        Command::Pull { operator } => {
            let operator = ctl.choose_operator(operator).await?;
            let report = ctl.pull(&operator).await?;
            if let Some(e) = report.error {
                println!("Pull failed, local claims are unchanged: {e}");
            }
        }

        Command::DecryptNkey { key } => {
            let keypair = ctl.reveal_key(&key).await?;
            println!("{}", keypair.seed().as_str());
        }

        Command::Nuke { yes } => {
            if !yes {
                bail!("refusing to remove {} without --yes", ctl.layout().root().display());
            }
            ctl.nuke()?;
            println!("All removed.");
        }
    }
    Ok(())
}

fn role_input(args: &RoleArgs) -> anyhow::Result<TemplateInput> {
    let mut publish = args.publish.clone();
    let mut subscribe = args.subscribe.clone();
    if let Some(path) = &args.pub_file {
        publish.extend(read_subjects(path)?);
    }
    if let Some(path) = &args.sub_file {
        subscribe.extend(read_subjects(path)?);
    }
    Ok(TemplateInput::new(publish, subscribe, args.allow_reply)?)
}

fn read_subjects(path: &Path) -> anyhow::Result<Vec<String>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_subject_lines(&text).with_context(|| format!("in {}", path.display()))
}

fn merge(mut current: Vec<String>, added: Vec<String>) -> Vec<String> {
    for subject in added {
        if !current.contains(&subject) {
            current.push(subject);
        }
    }
    current
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
