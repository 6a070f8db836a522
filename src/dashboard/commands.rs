//! Account and dashboard actions behind the CLI subcommands.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use super::report::{AdminReport, AnalyticsReport, InsightsReport, WhitelistReport};
use crate::{
    api::ApiClient,
    db::Database,
    models::{AdminStats, AdminUser, AuthToken},
};

type StdinLines = Lines<BufReader<Stdin>>;

const MIN_PASSWORD_LEN: usize = 8;

/// Pretty JSON when `json` is set, the text rendering otherwise.
fn emit<T: Serialize>(value: &T, json: bool, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
        println!("{rendered}");
    } else {
        print!("{}", text());
    }
    Ok(())
}

fn stdin_lines() -> StdinLines {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn prompt_line(lines: &mut StdinLines, prompt: &str) -> Result<String> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(prompt.as_bytes()).await?;
    stderr.flush().await?;

    let line = lines
        .next_line()
        .await
        .context("failed to read from stdin")?
        .unwrap_or_default();
    Ok(line.trim_end().to_string())
}

async fn remember(db: &Database, token: &AuthToken) -> Result<()> {
    db.store_credentials(token)
        .await
        .context("failed to store credentials")?;
    println!("Logged in as {} (user {})", token.email, token.user_id);
    Ok(())
}

pub async fn login(
    api: &ApiClient,
    db: &Database,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_line(&mut stdin_lines(), "Password: ").await?,
    };
    let token = api.login(email, &password).await.context("login failed")?;
    remember(db, &token).await
}

pub async fn signup(
    api: &ApiClient,
    db: &Database,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let (password, confirm) = match password {
        Some(password) => (password.clone(), password),
        None => {
            let mut lines = stdin_lines();
            let password = prompt_line(&mut lines, "Password: ").await?;
            let confirm = prompt_line(&mut lines, "Confirm password: ").await?;
            (password, confirm)
        }
    };
    if password != confirm {
        bail!("passwords do not match");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {MIN_PASSWORD_LEN} characters");
    }

    let token = api
        .signup(email, &password, &confirm)
        .await
        .context("signup failed")?;
    remember(db, &token).await
}

/// Forgets the credential and the persisted tracking session.
pub async fn logout(db: &Database) -> Result<()> {
    db.clear_credentials().await?;
    db.clear_session_id().await?;
    db.clear_tracked_tabs().await?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(api: &ApiClient, db: &Database) -> Result<()> {
    let account = db.stored_account().await?;
    if db.auth_token().await?.is_none() {
        println!("Not logged in");
        return Ok(());
    }

    let profile = api.me().await.context("failed to fetch profile")?;
    println!("{} (user {}, role {})", profile.email, profile.id, profile.role);
    if account.user_id.is_some_and(|id| id != profile.id) {
        println!("warning: stored user id {:?} differs from the server's", account.user_id);
    }
    Ok(())
}

pub async fn report(api: &ApiClient, period_days: u32, json: bool) -> Result<()> {
    if period_days == 0 {
        bail!("period must be at least one day");
    }
    let analytics = api
        .analytics(period_days)
        .await
        .context("failed to load analytics")?;
    emit(&analytics, json, || {
        AnalyticsReport {
            analytics: &analytics,
            period_days,
            today: Utc::now().date_naive(),
        }
        .to_string()
    })
}

pub async fn insights(api: &ApiClient, json: bool) -> Result<()> {
    let insights = api.insights().await.context("failed to load insights")?;
    emit(&insights, json, || InsightsReport(&insights).to_string())
}

pub async fn list_whitelist(api: &ApiClient, json: bool) -> Result<()> {
    let entries = api.whitelist().await.context("failed to load whitelist")?;
    emit(&entries, json, || WhitelistReport(&entries).to_string())
}

pub async fn add_to_whitelist(api: &ApiClient, domain: &str, reason: &str) -> Result<()> {
    if domain.trim().is_empty() {
        bail!("domain must not be empty");
    }
    match api
        .add_to_whitelist(domain, reason)
        .await
        .context("failed to add domain to whitelist")?
    {
        Some(domain_id) => println!("Whitelisted {domain} (domain {domain_id})"),
        None => println!("Whitelisted {domain}"),
    }
    Ok(())
}

pub async fn remove_from_whitelist(api: &ApiClient, domain_id: i64) -> Result<()> {
    api.remove_from_whitelist(domain_id)
        .await
        .context("failed to remove domain from whitelist")?;
    println!("Removed domain {domain_id} from whitelist");
    Ok(())
}

async fn require_admin(api: &ApiClient) -> Result<()> {
    let profile = api.me().await.context("failed to fetch profile")?;
    if !profile.is_admin() {
        bail!("{} is not an administrator", profile.email);
    }
    Ok(())
}

#[derive(Serialize)]
struct AdminOverview<'a> {
    stats: &'a AdminStats,
    users: &'a [AdminUser],
}

pub async fn admin_overview(api: &ApiClient, json: bool) -> Result<()> {
    require_admin(api).await?;
    let stats = api.admin_stats().await.context("failed to load admin stats")?;
    let users = api.admin_users().await.context("failed to load users")?;

    let overview = AdminOverview {
        stats: &stats,
        users: &users,
    };
    emit(&overview, json, || {
        AdminReport {
            stats: &stats,
            users: &users,
        }
        .to_string()
    })
}

pub async fn admin_delete_user(api: &ApiClient, user_id: i64) -> Result<()> {
    require_admin(api).await?;
    api.delete_user(user_id)
        .await
        .with_context(|| format!("failed to delete user {user_id}"))?;
    println!("Deleted user {user_id}");
    Ok(())
}
