//! Subcommand handlers.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use scandash_core::auth::{token_status, TokenStatus};
use scandash_core::models::{NewUser, ScanKind, UrlHistory, UserUpdate};
use scandash_core::{ApiClient, Config, FileSessionStore, SessionKey};

use crate::{Cli, Command, RoleCommand, UserCommand};

/// Everything a subcommand needs
struct App {
    api: ApiClient,
    config: Config,
    json: bool,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = FileSessionStore::open(config.cache_dir()?)
        .context("Failed to open the session store")?;
    debug!(path = %store.path().display(), "Session store opened");

    let api = ApiClient::from_config(&config, Arc::new(store))?;
    let mut ctx = App {
        api,
        config,
        json: cli.json,
    };

    match cli.command {
        Command::Login { username } => login(&mut ctx, username).await,
        Command::Logout => logout(&ctx).await,
        Command::Whoami => whoami(&ctx),
        Command::Users(command) => users(&ctx, command).await,
        Command::Roles(command) => roles(&ctx, command).await,
        Command::Scan { url } => {
            let result = ctx.api.scans().detect_protocol(&url).await?;
            print_json(&result)
        }
        Command::History { search, page } => history(&ctx, &search, page).await,
        Command::Forget { url_id } => {
            ctx.api.scans().delete(&url_id).await?;
            println!("Deleted scan {}", url_id);
            Ok(())
        }
        Command::Result { url_id, kind } => results(&ctx, &url_id, kind).await,
        Command::Summary { url_id } => {
            let summary = ctx.api.scans().summary(&url_id).await?;
            print_json(&summary)
        }
        Command::Report {
            url_id,
            lines_per_page,
        } => {
            let report = ctx.api.scans().report(&url_id).await?;
            println!("{}", report.to_text(lines_per_page));
            Ok(())
        }
    }
}

// ============================================================================
// Session
// ============================================================================

async fn login(ctx: &mut App, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| ctx.config.last_username.clone()) {
        Some(name) => name,
        None => prompt("Username: ")?,
    };
    if username.is_empty() {
        bail!("A username is required");
    }
    let password = rpassword::prompt_password(format!("Password for {}: ", username))?;

    let login = ctx.api.auth().login(&username, &password).await?;

    ctx.config.last_username = Some(username);
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Signed in as {} <{}>", login.user.username, login.user.email);
    Ok(())
}

async fn logout(ctx: &App) -> Result<()> {
    if ctx.api.auth().logout().await? {
        println!("Signed out");
    } else {
        println!("Signed out locally");
    }
    Ok(())
}

fn whoami(ctx: &App) -> Result<()> {
    let profile = ctx.api.auth().profile();
    let token = ctx.api.session().get(SessionKey::AccessToken);
    let refreshable = ctx.api.session().get(SessionKey::RefreshToken).is_some();

    println!("User:    {}", profile.username.as_deref().unwrap_or("-"));
    println!("Email:   {}", profile.email.as_deref().unwrap_or("-"));
    println!("Roles:   {}", join_or_dash(&profile.roles));
    let status = match token_status(token.as_deref()) {
        TokenStatus::Missing => "no access token".to_string(),
        TokenStatus::Malformed(reason) => format!("unreadable access token ({})", reason),
        TokenStatus::Expiring { seconds_left } if seconds_left <= 0 => "access token expired".to_string(),
        TokenStatus::Expiring { seconds_left } => {
            format!("access token expires in {}s, will be refreshed", seconds_left)
        }
        TokenStatus::Valid { seconds_left } => {
            format!("access token valid for {}m", seconds_left / 60)
        }
    };
    println!("Session: {}", status);
    if !refreshable {
        println!("         no refresh token stored");
    }
    Ok(())
}

// ============================================================================
// Users and roles
// ============================================================================

async fn users(ctx: &App, command: UserCommand) -> Result<()> {
    let service = ctx.api.users();
    match command {
        UserCommand::List => {
            let users = service.list_with_roles().await?;
            if ctx.json {
                return print_json(&users);
            }
            println!("{:<38} {:<20} {:<32} {:<9} Roles", "ID", "Username", "Email", "Status");
            for user in &users {
                println!(
                    "{:<38} {:<20} {:<32} {:<9} {}",
                    user.user_id,
                    user.username,
                    user.email,
                    user.status_display(),
                    join_or_dash(&user.roles)
                );
            }
            println!("{} users", users.len());
        }
        UserCommand::Show { user_id } => {
            let user = service.get(&user_id).await?;
            if ctx.json {
                return print_json(&user);
            }
            println!("ID:       {}", user.user_id);
            println!("Username: {}", user.username);
            println!("Email:    {}", user.email);
            println!("Phone:    {}", user.phone.as_deref().unwrap_or("-"));
            println!("Active:   {}", if user.is_active { "yes" } else { "no" });
            println!("Created:  {}", user.created_at.as_deref().unwrap_or("-"));
            println!("Updated:  {}", user.updated_at.as_deref().unwrap_or("-"));
        }
        UserCommand::Create {
            username,
            email,
            phone,
        } => {
            let password = read_new_password()?;
            let user = service
                .create(&NewUser {
                    username,
                    email,
                    password,
                    phone,
                })
                .await?;
            println!("Created user {} ({})", user.username, user.user_id);
        }
        UserCommand::Update {
            user_id,
            username,
            email,
            phone,
            active,
        } => {
            let current = service.get(&user_id).await?;
            let update = UserUpdate {
                username,
                email,
                phone,
                is_active: active,
            }
            .changes_from(&current);
            if update.is_empty() {
                println!("Nothing to change");
                return Ok(());
            }
            let user = service.update(&user_id, &update).await?;
            println!("Updated user {}", user.username);
        }
        UserCommand::ResetPassword { user_id } => {
            let password = read_new_password()?;
            println!("{}", service.reset_password(&user_id, &password).await?);
        }
        UserCommand::Delete { user_id } => {
            service.delete(&user_id).await?;
            println!("Deleted user {}", user_id);
        }
    }
    Ok(())
}

async fn roles(ctx: &App, command: RoleCommand) -> Result<()> {
    let service = ctx.api.roles();
    match command {
        RoleCommand::List => {
            let roles = service.list().await?;
            if ctx.json {
                return print_json(&roles);
            }
            for role in &roles {
                println!("{:<38} {}", role.role_id, role.role_name);
            }
        }
        RoleCommand::Assign { user_id, role } => {
            let Some(found) = service.find_by_name(&role).await? else {
                bail!("No role named {}", role);
            };
            service.assign(&user_id, &found.role_id).await?;
            println!("Assigned {} to {}", found.role_name, user_id);
        }
        RoleCommand::Remove { user_id, role } => {
            let Some(found) = service.find_by_name(&role).await? else {
                bail!("No role named {}", role);
            };
            service.remove(&user_id, &found.role_id).await?;
            println!("Removed {} from {}", found.role_name, user_id);
        }
    }
    Ok(())
}

// ============================================================================
// Scans
// ============================================================================

async fn history(ctx: &App, search: &str, page: usize) -> Result<()> {
    let history = UrlHistory::new(ctx.api.scans().history().await?);
    let matches = history.filter(search);
    let page = UrlHistory::clamp_page(page, matches.len());
    let rows = UrlHistory::page(&matches, page);
    if ctx.json {
        return print_json(&rows);
    }

    if matches.is_empty() {
        println!("No scanned URLs");
        return Ok(());
    }
    println!("{:<38} {:<21} URL", "ID", "Scanned");
    for entry in &rows {
        println!("{:<38} {:<21} {}", entry.url_id, entry.created_at, entry.url);
    }
    println!(
        "Page {} of {} ({} URLs)",
        page,
        UrlHistory::page_count(matches.len()),
        matches.len()
    );
    Ok(())
}

async fn results(ctx: &App, url_id: &str, kind: Option<ScanKind>) -> Result<()> {
    let scans = ctx.api.scans();
    if let Some(kind) = kind {
        return print_json(&scans.result(kind, url_id).await?);
    }

    let fetched = join_all(ScanKind::ALL.iter().map(|kind| scans.result(*kind, url_id))).await;
    for (kind, result) in ScanKind::ALL.iter().zip(fetched) {
        println!("== {} ==", kind);
        match result {
            Ok(value) => print_json(&value)?,
            Err(e) if e.requires_login() => return Err(e.into()),
            Err(e) => println!("unavailable: {}", e),
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_new_password() -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}
