//! Subcommand handlers

use anyhow::{Result, bail};
use postdesk_api::{Credentials, Permissions, PostRecord};
use postdesk_core::{CoreError, PostForm, SortConfig, SortDirection, TableQuery};
use postdesk_store::AuditEventType;
use postdesk_util::MonotonicInstant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::{App, Command};

pub async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => login(app, &username, password).await,
        Command::Logout => logout(app),
        Command::Whoami => whoami(app),
        Command::List {
            search,
            sort,
            desc,
            page,
            page_size,
            refresh,
        } => {
            let direction = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            let query = TableQuery {
                search,
                sort: SortConfig::new(sort, direction),
                page,
            };
            list(app, &query, page_size, refresh).await
        }
        Command::Show { id } => show(app, id).await,
        Command::Create {
            user_id,
            title,
            body,
        } => create(app, PostForm::new(user_id, title, body)).await,
        Command::Update {
            id,
            user_id,
            title,
            body,
        } => update(app, id, user_id, title, body).await,
        Command::Delete { id } => delete(app, id).await,
        Command::Audit { limit } => audit(app, limit),
    }
}

/// Candidate passwords: the one given on the command line, or else one
/// per line from `input`
struct Passwords<R> {
    flag: Option<String>,
    lines: Option<Lines<R>>,
}

impl<R: AsyncBufRead + Unpin> Passwords<R> {
    fn new(flag: Option<String>, input: R) -> Self {
        let lines = flag.is_none().then(|| input.lines());
        Self { flag, lines }
    }

    async fn next(&mut self) -> std::io::Result<Option<String>> {
        match &mut self.lines {
            Some(lines) => lines.next_line().await,
            None => Ok(self.flag.take()),
        }
    }
}

async fn login(app: &App, username: &str, password: Option<String>) -> Result<()> {
    let mut flow = app.login_flow();

    let mut passwords = Passwords::new(password, BufReader::new(tokio::io::stdin()));

    while let Some(password) = passwords.next().await? {
        let now = MonotonicInstant::now();
        match flow.login(&Credentials::new(username, password), now).await {
            Ok(user) => {
                println!("Logged in as {} ({})", user.username, user.role);
                return Ok(());
            }
            Err(CoreError::Invalid(errors)) => {
                for (field, message) in errors.iter() {
                    eprintln!("{}: {}", field, message);
                }
            }
            Err(e @ CoreError::InvalidCredentials(_)) => {
                let remaining = flow.status(now).remaining_attempts;
                eprintln!("{} ({} attempts left)", e, remaining);
            }
            Err(e) => return Err(e.into()),
        }
    }

    bail!("Login failed")
}

fn logout(app: &App) -> Result<()> {
    match app.login_flow().logout()? {
        Some(user) => println!("Logged out {}", user.username),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn whoami(app: &App) -> Result<()> {
    let dashboard = app.dashboard()?;
    let user = dashboard.user();
    println!("{} ({})", user.username, user.role);
    println!("  logged in: {}", user.logged_in_at.format("%Y-%m-%d %H:%M:%S"));

    let abilities: Vec<&str> = [
        (Permissions::VIEW, "view"),
        (Permissions::CREATE, "create"),
        (Permissions::EDIT, "edit"),
        (Permissions::DELETE, "delete"),
    ]
    .into_iter()
    .filter(|(permission, _)| user.can(*permission))
    .map(|(_, name)| name)
    .collect();
    println!("  can: {}", abilities.join(", "));
    Ok(())
}

fn print_row(record: &PostRecord) {
    let marker = if record.is_locally_created { "*" } else { " " };
    println!(
        "{:>5}{} {:>5}  {}",
        record.id(),
        marker,
        record.post.user_id,
        record.post.title
    );
}

async fn list(
    app: &App,
    query: &TableQuery,
    page_size: Option<usize>,
    refresh: bool,
) -> Result<()> {
    let mut dashboard = app.dashboard()?;
    if let Some(page_size) = page_size {
        dashboard = dashboard.with_page_size(page_size);
    }
    if refresh {
        dashboard.refresh().await?;
    }

    let page = dashboard.table(query).await?;
    println!("{:>5}  {:>5}  TITLE", "ID", "USER");
    for record in &page.rows {
        print_row(record);
    }

    let pagination = page.pagination;
    println!();
    println!(
        "Showing {} (page {} of {})",
        pagination.showing(),
        pagination.current_page(),
        pagination.total_pages().max(1)
    );
    Ok(())
}

async fn show(app: &App, id: i64) -> Result<()> {
    let record = app.dashboard()?.post(id).await?;
    println!("Post {}", record.id());
    println!("  user:  {}", record.post.user_id);
    println!("  title: {}", record.post.title);
    if record.is_locally_created {
        println!("  (local only)");
    }
    println!();
    println!("{}", record.post.body);
    Ok(())
}

async fn create(app: &App, form: PostForm) -> Result<()> {
    let record = app.dashboard()?.create(&form).await?;
    println!("Created post {}", record.id());
    if record.is_locally_created {
        println!("The remote does not keep new posts; it exists for this session only.");
    }
    Ok(())
}

async fn update(
    app: &App,
    id: i64,
    user_id: Option<String>,
    title: Option<String>,
    body: Option<String>,
) -> Result<()> {
    let dashboard = app.dashboard()?;
    let current = dashboard.post(id).await?;
    let form = PostForm::new(
        user_id.unwrap_or_else(|| current.post.user_id.to_string()),
        title.unwrap_or(current.post.title),
        body.unwrap_or(current.post.body),
    );

    let updated = dashboard.update(id, &form).await?;
    println!("Updated post {}", updated.record.id());
    if updated.recovered_locally {
        println!("The remote rejected the update; the change was kept locally.");
    }
    Ok(())
}

async fn delete(app: &App, id: i64) -> Result<()> {
    let dashboard = app.dashboard()?;
    dashboard.delete(id).await?;
    println!("Deleted post {}", id);
    Ok(())
}

fn describe(event: &AuditEventType) -> String {
    match event {
        AuditEventType::LoginSucceeded { username, role } => {
            format!("login {} as {}", username, role)
        }
        AuditEventType::LoginFailed { username, reason } => {
            format!("login failed for {}: {}", username, reason)
        }
        AuditEventType::LoginBlocked {
            username,
            retry_after_secs,
        } => format!("login blocked for {} ({}s left)", username, retry_after_secs),
        AuditEventType::LoggedOut { username } => format!("logout {}", username),
        AuditEventType::PostCreated {
            post_id,
            locally_created,
            actor,
        } => {
            let scope = if *locally_created { " (local)" } else { "" };
            format!("{} created post {}{}", actor, post_id, scope)
        }
        AuditEventType::PostUpdated {
            post_id,
            recovered_locally,
            actor,
        } => {
            let scope = if *recovered_locally { " (kept locally)" } else { "" };
            format!("{} updated post {}{}", actor, post_id, scope)
        }
        AuditEventType::PostDeleted { post_id, actor } => {
            format!("{} deleted post {}", actor, post_id)
        }
        AuditEventType::DeleteRolledBack {
            post_id,
            error,
            actor,
        } => format!("{} failed to delete post {}: {}", actor, post_id, error),
    }
}

fn audit(app: &App, limit: usize) -> Result<()> {
    let events = app.dashboard()?.recent_audits(limit)?;
    if events.is_empty() {
        println!("No audit events");
    }
    for event in events {
        println!(
            "{}  {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            describe(&event.event)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use postdesk_api::UserRole;

    #[test]
    fn describes_audit_events() {
        assert_eq!(
            describe(&AuditEventType::LoginSucceeded {
                username: "editor@test.com".into(),
                role: UserRole::Editor,
            }),
            "login editor@test.com as editor"
        );
        assert_eq!(
            describe(&AuditEventType::PostCreated {
                post_id: 101,
                locally_created: true,
                actor: "editor@test.com".into(),
            }),
            "editor@test.com created post 101 (local)"
        );
    }

    #[tokio::test]
    async fn passwords_come_from_flag_or_lines() {
        let mut passwords = Passwords::new(Some("Editor123!".into()), &b"ignored\n"[..]);
        assert_eq!(passwords.next().await.unwrap().as_deref(), Some("Editor123!"));
        assert_eq!(passwords.next().await.unwrap(), None);

        let mut passwords = Passwords::new(None, &b"first\nsecond\n"[..]);
        assert_eq!(passwords.next().await.unwrap().as_deref(), Some("first"));
        assert_eq!(passwords.next().await.unwrap().as_deref(), Some("second"));
        assert_eq!(passwords.next().await.unwrap(), None);
    }

    #[test]
    fn rate_limit_message_rounds_up() {
        let err = CoreError::RateLimited {
            retry_after: std::time::Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "Too many failed attempts. Try again in 2 seconds."
        );
    }
}
