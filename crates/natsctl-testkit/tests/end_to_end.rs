//! The full operator → account → role → user flow on a filesystem root.

use natsctl::core::{
    parse_user_config, KeyKind, PublicKey, UserClaims, DENY_ALL, SYSTEM_ACCOUNT_NAME,
};
use natsctl::perms::{Policy, TemplateInput, PRIVATE_INBOX_SELECTOR, SHARED_INBOX};
use natsctl::store::{ClaimStore, ClaimStoreExt};
use natsctl::context::selected_context;
use natsctl::{CtlError, NatsContext, SyncDirection};
use natsctl_core::{AccountName, RoleName, ScopeChange};
use natsctl_testkit::fixtures::{account, operator, role, user, TestFixture};

fn worker_input() -> TemplateInput {
    TemplateInput::new(vec!["jobs.>".into()], vec![], false).unwrap()
}

#[tokio::test]
async fn operator_bootstrap_seals_everything_but_the_root() {
    let mut fixture = TestFixture::new();
    let bootstrap = fixture
        .ctl
        .init_operator(&operator(), "tls://nats.example.com:4222", None)
        .await
        .unwrap();

    let vault = fixture.ctl.vault();
    let root = PublicKey::decode(&bootstrap.root_public_key).unwrap();
    assert!(!vault.contains(&root));
    assert!(vault.contains(&PublicKey::decode(&bootstrap.signing_key).unwrap()));
    assert_eq!(fixture.plaintext_keys(), 0);

    let claims = fixture.ctl.store().read_operator(&operator()).await.unwrap();
    assert!(claims.nats.strict_signing_key_usage);
    assert_eq!(claims.sub, bootstrap.root_public_key);
    assert_eq!(claims.iss, bootstrap.signing_key);
    assert_eq!(
        claims.nats.account_server_url.as_deref(),
        Some("nats://nats.example.com:4222")
    );

    let config = std::fs::read_to_string(&bootstrap.server_config).unwrap();
    assert!(config.contains(&format!("system_account: {}", bootstrap.system_account)));
}

#[tokio::test]
async fn worker_scenario() {
    let mut fixture = TestFixture::new().with_account().await;
    let store = fixture.ctl.store();

    // Account: deny-all defaults and exactly one unscoped signing key.
    let app = store.read_account(&operator(), &account()).await.unwrap();
    assert_eq!(app.nats.default_permissions.publish.deny, vec![DENY_ALL]);
    assert_eq!(app.nats.default_permissions.subscribe.deny, vec![DENY_ALL]);
    let unscoped = app
        .nats
        .signing_keys
        .iter()
        .filter(|key| !key.is_scoped())
        .count();
    assert_eq!(unscoped, 1);

    // Role.
    let report = fixture
        .ctl
        .upsert_role(&operator(), &account(), &role(), worker_input())
        .await
        .unwrap();
    assert_eq!(report.change, ScopeChange::Added);

    let app = fixture
        .ctl
        .store()
        .read_account(&operator(), &account())
        .await
        .unwrap();
    let scope = app.nats.signing_keys.find_by_role("worker").unwrap();
    assert_eq!(scope.key, report.signing_key);
    assert_eq!(scope.template.publish.allow, vec!["jobs.>"]);
    assert_eq!(scope.template.subscribe.allow, vec![PRIVATE_INBOX_SELECTOR]);
    assert_eq!(scope.template.subscribe.deny, vec![SHARED_INBOX]);
    assert!(scope.template.resp.is_none());

    // User.
    let issued = fixture
        .ctl
        .issue_user(&operator(), &account(), &role(), &user())
        .await
        .unwrap();
    assert_eq!(
        issued.creds_path,
        fixture
            .path()
            .join("nsc/nkeys/creds/ROOT_TEST/APP/worker-1.creds")
    );
    assert!(issued.expires_at.is_none());
    assert_eq!(
        issued.inbox_prefix,
        Some(format!("_PRIV_INBOX.{}", issued.public_key))
    );

    let creds = parse_user_config(&std::fs::read_to_string(&issued.creds_path).unwrap()).unwrap();
    let claims = UserClaims::decode(&creds.jwt).unwrap();
    assert_eq!(claims.iss, report.signing_key);
    assert_eq!(claims.nats.issuer_account.as_deref(), Some(app.sub.as_str()));
    assert!(claims.nats.scoped);
    assert!(claims.exp.is_none());
    assert_eq!(claims.nats.permissions.publish.allow, vec!["jobs.>"]);

    let me = PublicKey::decode_kind(&claims.sub, KeyKind::User).unwrap();
    let policy = Policy::new(&claims.nats.permissions, &me);
    assert!(policy.can_publish("jobs.created"));
    assert!(!policy.can_publish("billing.created"));
    assert!(policy.can_subscribe(&format!("_PRIV_INBOX.{me}.reply")));
    assert!(!policy.can_subscribe("_INBOX.reply"));
    assert!(!policy.can_reply());

    assert_eq!(fixture.plaintext_keys(), 0);
}

#[tokio::test]
async fn editing_a_role_keeps_one_key() {
    let mut fixture = TestFixture::new().with_account().await;
    let first = fixture
        .ctl
        .upsert_role(&operator(), &account(), &role(), worker_input())
        .await
        .unwrap();
    let widened = TemplateInput::new(vec!["jobs.>".into()], vec!["events.>".into()], true).unwrap();
    let second = fixture
        .ctl
        .upsert_role(&operator(), &account(), &role(), widened)
        .await
        .unwrap();

    assert_eq!(first.signing_key, second.signing_key);
    assert!(matches!(second.change, ScopeChange::Modified { .. }));
    assert_eq!(
        fixture.ctl.roles(&operator(), &account()).await.unwrap(),
        vec!["worker"]
    );

    let app = fixture
        .ctl
        .store()
        .read_account(&operator(), &account())
        .await
        .unwrap();
    let scope = app.nats.signing_keys.find_by_role("worker").unwrap();
    assert_eq!(
        scope.template.subscribe.allow,
        vec!["events.>", PRIVATE_INBOX_SELECTOR]
    );
    assert!(scope.template.resp.is_some());
}

#[tokio::test]
async fn unknown_role_writes_nothing() {
    let mut fixture = TestFixture::new().with_account().await;
    let before = fixture.files();

    let result = fixture
        .ctl
        .issue_user(
            &operator(),
            &account(),
            &RoleName::new("missing").unwrap(),
            &user(),
        )
        .await;

    assert!(matches!(result, Err(CtlError::RoleNotFound { .. })));
    assert_eq!(fixture.files(), before);
}

#[tokio::test]
async fn unknown_account_is_rejected() {
    let mut fixture = TestFixture::new().with_account().await;
    let result = fixture
        .ctl
        .upsert_role(
            &operator(),
            &AccountName::new("OTHER").unwrap(),
            &role(),
            worker_input(),
        )
        .await;
    assert!(matches!(result, Err(CtlError::AccountNotFound { .. })));
}

#[tokio::test]
async fn admin_user_uses_unscoped_key() {
    let mut fixture = TestFixture::new().with_account().await;
    let issued = fixture
        .ctl
        .issue_admin_user(&operator(), &account())
        .await
        .unwrap();

    let app = fixture
        .ctl
        .store()
        .read_account(&operator(), &account())
        .await
        .unwrap();
    let creds = parse_user_config(&std::fs::read_to_string(&issued.creds_path).unwrap()).unwrap();
    let claims = UserClaims::decode(&creds.jwt).unwrap();

    assert_eq!(Some(claims.iss.as_str()), app.nats.signing_keys.find_unscoped());
    assert!(!claims.nats.scoped);
    let now = natsctl::core::jwt::now_secs();
    assert!(!claims.is_expired(now));
    assert!(claims.is_expired(now + 25 * 60 * 60));
    assert_eq!(claims.nats.permissions.publish.allow, vec![">"]);
    assert!(issued.creds_path.ends_with("APP/admin.creds"));
}

#[tokio::test]
async fn push_exposes_only_the_system_key_while_running() {
    let mut fixture = TestFixture::new().with_account().await;
    let report = fixture.ctl.push(&operator()).await.unwrap();
    assert!(report.is_success());

    let report = fixture.ctl.pull(&operator()).await.unwrap();
    assert!(report.is_success());

    let calls = fixture.resolver_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].direction, SyncDirection::Push);
    assert_eq!(calls[1].direction, SyncDirection::Pull);
    assert!(calls.iter().all(|call| call.plaintext_keys == 1));
    assert_eq!(fixture.plaintext_keys(), 0);
}

#[tokio::test]
async fn failing_resolver_is_not_fatal() {
    let mut fixture = TestFixture::with_failing_resolver().with_account().await;
    let report = fixture.ctl.pull(&operator()).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(fixture.plaintext_keys(), 0);

    // Local work continues with the claims on disk.
    fixture
        .ctl
        .upsert_role(&operator(), &account(), &role(), worker_input())
        .await
        .unwrap();
}

#[tokio::test]
async fn system_account_is_listed_with_the_application() {
    let fixture = TestFixture::new().with_account().await;
    let mut accounts = fixture
        .ctl
        .store()
        .list_accounts(&operator())
        .await
        .unwrap();
    accounts.sort();
    let names: Vec<&str> = accounts.iter().map(AccountName::as_str).collect();
    assert_eq!(names, vec!["APP", SYSTEM_ACCOUNT_NAME]);
}

#[tokio::test]
async fn issued_credentials_come_with_a_nats_context() {
    let mut fixture = TestFixture::new().with_account().await;
    fixture
        .ctl
        .upsert_role(&operator(), &account(), &role(), worker_input())
        .await
        .unwrap();
    let issued = fixture
        .ctl
        .issue_user(&operator(), &account(), &role(), &user())
        .await
        .unwrap();

    let path = fixture.contexts().join("ROOT_TEST_APP_worker-1.json");
    assert_eq!(issued.context.as_deref(), Some(path.as_path()));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let creds = std::fs::canonicalize(&issued.creds_path).unwrap();
    assert_eq!(json["url"], "tls://nats.example.com:4222");
    assert_eq!(json["creds"], creds.to_str().unwrap());
    assert_eq!(
        json["inbox_prefix"].as_str(),
        issued.inbox_prefix.as_deref()
    );
    assert_eq!(selected_context(&fixture.contexts()), None);

    let admin = fixture
        .ctl
        .issue_admin_user(&operator(), &account())
        .await
        .unwrap();
    let context = NatsContext::read(&admin.context.unwrap()).unwrap();
    assert_eq!(context.url, "tls://nats.example.com:4222");
    assert!(context.creds.ends_with("APP/admin.creds"));
    assert_eq!(
        selected_context(&fixture.contexts()).as_deref(),
        Some("ROOT_TEST_APP_admin")
    );
}
