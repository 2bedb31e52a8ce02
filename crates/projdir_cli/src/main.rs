//! Operator CLI for a project directory database.
//!
//! # Responsibility
//! - Migrate a database file to the latest schema.
//! - Provision accounts and issue dev sessions in place of an external auth
//!   provider.
//! - Seed projects.
//!
//! Output is one `key=value` line per command so it can be grepped in scripts.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use projdir_core::db::{migrations::latest_version, open_db};
use projdir_core::{
    Account, AccountRepository, IdentityAllocator, ProjectService, ProjectSubmission,
    ProvisionRequest, SessionPolicy, SqliteAccountRepository, SqliteProjectRepository,
    SqliteSessionStore,
};
use rusqlite::Connection;

#[derive(Parser, Debug)]
#[command(name = "projdir")]
#[command(about = "Project directory maintenance commands", long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "projdir.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Create (or fetch) the account for an auth subject
    Provision {
        #[arg(long)]
        auth_id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Issue a session token for an existing account
    IssueSession {
        #[arg(long)]
        auth_id: String,
        #[arg(long, default_value = "projdir-session")]
        cookie_name: String,
    },
    /// Revoke a session token
    RevokeSession {
        #[arg(long)]
        token: String,
    },
    /// Submit a project on behalf of an account
    AddProject {
        #[arg(long)]
        auth_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("projdir status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, Box<dyn Error>> {
    let conn = open_db(&cli.db)?;

    match cli.command {
        Command::Migrate => Ok(format!(
            "projdir migrate status=ok db={} schema_version={}",
            cli.db.display(),
            latest_version()
        )),
        Command::Provision {
            auth_id,
            email,
            handle,
            display_name,
        } => {
            let allocator = IdentityAllocator::new(SqliteAccountRepository::new(&conn));
            let provisioned = allocator.allocate(&ProvisionRequest {
                auth_id: Some(auth_id),
                email: Some(email),
                handle,
                display_name,
                ..ProvisionRequest::default()
            })?;
            Ok(format!(
                "projdir provision status=ok account_id={} handle={} created={}",
                provisioned.account.id, provisioned.account.handle, provisioned.created
            ))
        }
        Command::IssueSession {
            auth_id,
            cookie_name,
        } => {
            let account = require_account(&conn, &auth_id)?;
            let issued = SqliteSessionStore::new(&conn, SessionPolicy::default())
                .issue_session(account.id)?;
            Ok(format!(
                "projdir issue-session status=ok account_id={} expires_at={} cookie={}={}",
                account.id, issued.expires_at, cookie_name, issued.token
            ))
        }
        Command::RevokeSession { token } => {
            let revoked =
                SqliteSessionStore::new(&conn, SessionPolicy::default()).revoke_session(&token)?;
            Ok(format!("projdir revoke-session status=ok revoked={revoked}"))
        }
        Command::AddProject {
            auth_id,
            name,
            url,
            description,
        } => {
            let account = require_account(&conn, &auth_id)?;
            let service = ProjectService::new(SqliteProjectRepository::new(&conn));
            let project = service.submit(
                &ProjectSubmission {
                    name,
                    description,
                    url,
                },
                account.id,
            )?;
            Ok(format!(
                "projdir add-project status=ok project_id={} submitted_by={}",
                project.id, account.id
            ))
        }
    }
}

fn require_account(conn: &Connection, auth_id: &str) -> Result<Account, Box<dyn Error>> {
    SqliteAccountRepository::new(conn)
        .find_by_auth_id(auth_id)?
        .ok_or_else(|| format!("no account for auth id `{auth_id}`").into())
}
