use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use lms_core::{seed::KEY_PREFIX, LmsError, LmsStore, StoreOptions};
use shared::{
    domain::{Role, UserId, UserStatus},
    error::{ApiError, ApiException},
    protocol::{DashboardStats, NewUser, StaffStats, UserPatch},
};
use storage::{KvStore, Storage};
use tracing::info;

/// Operator commands against the LMS database.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/lms.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete every LMS key; the next start seeds a fresh database.
    Purge,
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that run against an opened store.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Drop every record and restore the demo accounts.
    Reset,
    Users,
    CreateUser {
        name: String,
        email: String,
        password: String,
        #[arg(long, default_value = "student")]
        role: String,
    },
    SetStatus {
        user_id: i64,
        #[arg(long)]
        inactive: bool,
    },
    Courses,
    CheckLogin {
        email: String,
        password: String,
    },
    Stats,
    /// Print every stored collection as one JSON document.
    Export,
}

fn lms_failure(err: LmsError) -> anyhow::Error {
    ApiException::from(ApiError::from(err)).into()
}

/// Operator writes run as the first active admin account.
async fn operator(store: &LmsStore) -> Result<UserId> {
    store
        .read(|s| {
            s.users()
                .iter()
                .find(|u| u.role == Role::Admin && u.is_active())
                .map(|u| u.id)
        })
        .await
        .ok_or_else(|| anyhow!("no active admin account; run `reset` first"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let storage = Arc::new(Storage::new(&cli.database_url).await?);
    match cli.command {
        Command::Purge => {
            let removed = storage.remove_prefix(KEY_PREFIX).await?;
            info!(removed, "purged lms keys");
            println!("purged {removed} keys");
            Ok(())
        }
        Command::Store(command) => run(storage, command).await,
    }
}

async fn run(storage: Arc<Storage>, command: StoreCommand) -> Result<()> {
    let store = LmsStore::open(storage.clone(), StoreOptions::default())
        .await
        .map_err(lms_failure)?;

    match command {
        StoreCommand::Reset => {
            store.reset().await.map_err(lms_failure)?;
            let users = store.read(|s| s.users().len()).await;
            info!(users, "database reset to demo data");
            println!("reset complete; {users} demo accounts restored");
        }
        StoreCommand::Users => {
            let profiles = store.read(|s| s.user_profiles()).await;
            for user in profiles {
                println!(
                    "{}\t{}\t{}\t{}\t{:?}",
                    user.id, user.name, user.email, user.role, user.status
                );
            }
        }
        StoreCommand::CreateUser {
            name,
            email,
            password,
            role,
        } => {
            let role =
                Role::from_label(&role).ok_or_else(|| anyhow!("unknown role `{role}`"))?;
            let actor = operator(&store).await?;
            let input = NewUser {
                name,
                email,
                password,
                role,
                status: UserStatus::Active,
            };
            let user = store
                .write(|s| s.add_user(actor, &input))
                .await
                .map_err(lms_failure)?;
            info!(user_id = %user.id, role = %user.role, "created user");
            println!("created user_id={} role={}", user.id, user.role);
        }
        StoreCommand::SetStatus { user_id, inactive } => {
            let actor = operator(&store).await?;
            let status = if inactive {
                UserStatus::Inactive
            } else {
                UserStatus::Active
            };
            let patch = UserPatch {
                status: Some(status),
                ..UserPatch::default()
            };
            let user = store
                .write(|s| s.update_user(actor, UserId(user_id), &patch))
                .await
                .map_err(lms_failure)?;
            println!("user_id={} status={:?}", user.id, user.status);
        }
        StoreCommand::Courses => {
            let rows = store
                .read(|s| {
                    s.courses()
                        .iter()
                        .map(|c| {
                            format!(
                                "{}\t{}\t{:?}\t{} students\t{:.1}\t{}",
                                c.id,
                                c.title,
                                c.status,
                                s.enrolled_students(c.id).len(),
                                c.rating,
                                c.created_by_name
                            )
                        })
                        .collect::<Vec<_>>()
                })
                .await;
            for row in rows {
                println!("{row}");
            }
        }
        StoreCommand::CheckLogin { email, password } => {
            let user = store
                .read(|s| s.login(&email, &password))
                .await
                .map_err(lms_failure)?;
            println!("ok: {} ({})", user.name, user.role);
        }
        StoreCommand::Stats => {
            let counts = store
                .read(|s| {
                    [
                        ("users", s.users().len()),
                        ("courses", s.courses().len()),
                        ("assignments", s.assignments().len()),
                        ("submissions", s.submissions().len()),
                        ("quizzes", s.quizzes().len()),
                        ("certificates", s.certificates().len()),
                        ("messages", s.messages().len()),
                        ("notifications", s.notifications().len()),
                    ]
                })
                .await;
            for (label, count) in counts {
                println!("{label:>14}: {count}");
            }

            let actor = operator(&store).await?;
            let dashboard = store
                .read(|s| s.dashboard_stats(actor))
                .await
                .map_err(lms_failure)?;
            if let DashboardStats::Staff(StaffStats {
                platform: Some(platform),
                ..
            }) = dashboard
            {
                for entry in platform.users_by_role {
                    println!("{:>14}: {}", entry.role.label(), entry.count);
                }
                for entry in platform.content_by_kind {
                    println!("{:>14}: {}", format!("{:?}", entry.kind), entry.count);
                }
            }
        }
        StoreCommand::Export => {
            let mut document = BTreeMap::new();
            for key in storage.keys_with_prefix(KEY_PREFIX).await? {
                let Some(raw) = storage.get_item(&key).await? else {
                    continue;
                };
                let value = serde_json::from_str(&raw)
                    .unwrap_or(serde_json::Value::String(raw));
                document.insert(key, value);
            }
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
