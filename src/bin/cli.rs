use clap::{Parser, Subcommand};
use std::sync::Arc;
use totalis::{
    clock::SystemClock,
    config::AppConfig,
    db,
    models::User,
    services::{
        create_email_service,
        user_service::{RegisterRequest, UpdatePasswordRequest},
    },
    AppState,
};

#[derive(Parser)]
#[command(name = "totalis-cli")]
#[command(about = "Operations tool for Totalis customer accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Recovery token maintenance
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new customer account
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        #[arg(short, long)]
        age: Option<i64>,

        /// Mark email as verified
        #[arg(long)]
        verified: bool,
    },

    /// List accounts, newest first
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete an account
    Delete {
        #[arg(short, long)]
        email: String,
    },

    /// Mark an account's email as verified
    Verify {
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for an account
    SetPassword {
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Drop a pending recovery token so its link stops working
    ClearRecovery {
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Clear every recovery token past its expiry
    Purge,
}

fn get_password(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn confirm_password(prompt: &str) -> anyhow::Result<(String, String)> {
    let password = get_password(prompt)?;
    let confirm = get_password("Confirm password")?;
    Ok((password, confirm))
}

async fn require_user(state: &AppState, email: &str) -> anyhow::Result<User> {
    match state.user_service.find_user_by_email(email).await? {
        Some(user) => Ok(user),
        None => {
            eprintln!("❌ User not found: {}", email);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let state = AppState::new(
        pool.clone(),
        create_email_service(),
        Arc::new(SystemClock),
        &config.base_url,
        &config.support_email,
    );

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                name,
                email,
                password,
                age,
                verified,
            } => {
                let (password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("Password")?,
                };

                if password != password_confirm {
                    eprintln!("❌ Passwords do not match");
                    std::process::exit(1);
                }

                let registration = match state
                    .user_service
                    .register(RegisterRequest {
                        name,
                        email,
                        password,
                        age,
                    })
                    .await
                {
                    Ok(registration) => registration,
                    Err(err) => {
                        eprintln!("❌ Failed to create user: {}", err);
                        std::process::exit(1);
                    }
                };

                let user = registration.user;
                if verified {
                    state.user_service.verify_user_email(user.id).await?;
                }

                println!("✅ User created successfully!");
                println!("  ID: {}", user.id);
                println!("  Name: {}", user.name);
                println!("  Email: {}", user.email);
                println!("  Verified: {}", verified);
                if !verified && !registration.delivered {
                    println!("  ⚠️  Verification email could not be sent");
                }
            }

            UserCommands::List { limit, offset } => {
                let users = state.user_service.list_users(Some(limit), Some(offset)).await?;

                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<6} {:<30} {:<24} {:<9} {:<7} {:<20}",
                        "ID", "Email", "Name", "Verified", "Logins", "Created"
                    );
                    println!("{}", "-".repeat(100));
                    for user in users {
                        println!(
                            "{:<6} {:<30} {:<24} {:<9} {:<7} {:<20}",
                            user.id,
                            user.email,
                            user.name,
                            if user.verified { "yes" } else { "no" },
                            user.login_count,
                            user.created_at.as_deref().unwrap_or("-"),
                        );
                    }
                }
            }

            UserCommands::Delete { email } => {
                let user = require_user(&state, &email).await?;
                state.user_service.delete_user(user.id).await?;
                println!("✅ User deleted: {}", user.email);
            }

            UserCommands::Verify { email } => {
                let user = require_user(&state, &email).await?;
                if user.verified {
                    println!("ℹ️  {} is already verified", user.email);
                } else {
                    state.user_service.verify_user_email(user.id).await?;
                    println!("✅ Email verified: {}", user.email);
                }
            }

            UserCommands::SetPassword { email, password } => {
                let user = require_user(&state, &email).await?;

                let (new_password, confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("New password")?,
                };

                match state
                    .user_service
                    .update_password(UpdatePasswordRequest {
                        user_id: user.id,
                        new_password,
                        new_password_confirm: Some(confirm),
                    })
                    .await
                {
                    Ok(()) => println!("✅ Password updated for {}", user.email),
                    Err(err) => {
                        eprintln!("❌ Failed to update password: {}", err);
                        std::process::exit(1);
                    }
                }
            }

            UserCommands::ClearRecovery { email } => {
                let user = require_user(&state, &email).await?;
                state.user_service.clear_recovery_token(user.id).await?;
                println!("✅ Recovery token cleared for {}", user.email);
            }
        },

        Commands::Tokens { command } => match command {
            TokenCommands::Purge => {
                let purged = state.recovery_service.purge_expired().await?;
                println!("✅ Cleared {} expired recovery token(s)", purged);
            }
        },
    }

    pool.close().await;
    Ok(())
}
