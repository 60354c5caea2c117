//! CLI commands

use anyhow::{Result, bail};
use clap::Subcommand;
use kcc_http::DashboardClient;
use kcc_http::types::{AnalyticsRange, OnboardingStep};
use serde::Serialize;
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session in the data directory
    Login {
        /// Administrator email address
        #[arg(long, env = "KCC_EMAIL")]
        email: String,

        /// Account password
        #[arg(long, env = "KCC_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in administrator
    Whoami,

    /// Cafe profile and onboarding
    Cafe {
        #[command(subcommand)]
        command: CafeCommands,
    },

    /// QR code and staff PIN used to verify stamps
    Verification {
        #[command(subcommand)]
        command: VerificationCommands,
    },

    /// Visit and stamp analytics
    Stats {
        /// Window to report on (7d, 30d or 90d)
        #[arg(long, default_value = "7d")]
        range: AnalyticsRange,

        /// Also print the per-day series
        #[arg(long)]
        daily: bool,
    },

    /// Events and promotions
    Events {
        #[command(subcommand)]
        command: EventCommands,
    },

    /// Dashboard notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },
}

#[derive(Subcommand)]
pub enum CafeCommands {
    /// Show the cafe profile and the next onboarding step
    Show,
}

#[derive(Subcommand)]
pub enum VerificationCommands {
    /// Show the current QR code and whether a staff PIN is set
    Show,

    /// Set the staff PIN (4 to 6 digits)
    SetPin {
        #[arg(long, env = "KCC_STAFF_PIN", hide_env_values = true)]
        pin: String,
    },

    /// Issue a new QR code
    RegenerateQr,
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// List events and promotions
    List,
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications
    List {
        /// Only show unread notifications
        #[arg(long)]
        unread: bool,
    },
}

impl Commands {
    pub async fn execute(self, client: DashboardClient) -> Result<()> {
        match self {
            Commands::Login { email, password } => {
                let user = client.login(email, password).await?;
                println!("Signed in as {} <{}>", user.name, user.email);
                Ok(())
            }
            Commands::Logout => {
                client.logout().await?;
                println!("Signed out");
                Ok(())
            }
            Commands::Whoami => {
                require_session(&client).await?;
                print_json(&client.me().await?)
            }
            Commands::Cafe { command } => {
                require_session(&client).await?;
                command.execute(&client).await
            }
            Commands::Verification { command } => {
                require_session(&client).await?;
                command.execute(&client).await
            }
            Commands::Stats { range, daily } => {
                require_session(&client).await?;
                show_stats(&client, range, daily).await
            }
            Commands::Events { command } => {
                require_session(&client).await?;
                command.execute(&client).await
            }
            Commands::Notifications { command } => {
                require_session(&client).await?;
                command.execute(&client).await
            }
        }
    }
}

impl CafeCommands {
    pub async fn execute(self, client: &DashboardClient) -> Result<()> {
        match self {
            CafeCommands::Show => {
                let (cafe, onboarding) =
                    tokio::try_join!(client.get_cafe(), client.onboarding_status())?;
                print_json(&cafe)?;
                match onboarding.next_step() {
                    None => println!("Onboarding complete"),
                    Some(step) => println!("Next onboarding step: {}", step_label(step)),
                }
                Ok(())
            }
        }
    }
}

impl VerificationCommands {
    pub async fn execute(self, client: &DashboardClient) -> Result<()> {
        match self {
            VerificationCommands::Show => print_json(&client.verification_settings().await?),
            VerificationCommands::SetPin { pin } => {
                client.set_staff_pin(&pin).await?;
                info!("Staff PIN updated");
                println!("Staff PIN updated");
                Ok(())
            }
            VerificationCommands::RegenerateQr => {
                let settings = client.regenerate_qr_code().await?;
                println!("New QR code: {}", settings.qr_code_url);
                Ok(())
            }
        }
    }
}

impl EventCommands {
    pub async fn execute(self, client: &DashboardClient) -> Result<()> {
        match self {
            EventCommands::List => {
                let events = client.list_events().await?;
                if events.is_empty() {
                    println!("No events");
                }
                for event in events {
                    println!(
                        "{}  {} - {}  {}",
                        event.id,
                        event.starts_at.format("%Y-%m-%d %H:%M"),
                        event.ends_at.format("%Y-%m-%d %H:%M"),
                        event.title
                    );
                }
                Ok(())
            }
        }
    }
}

impl NotificationCommands {
    pub async fn execute(self, client: &DashboardClient) -> Result<()> {
        match self {
            NotificationCommands::List { unread } => {
                let notifications = client.list_notifications().await?;
                for notification in notifications
                    .into_iter()
                    .filter(|notification| !unread || !notification.read)
                {
                    let marker = if notification.read { " " } else { "*" };
                    println!(
                        "{marker} {}  {}: {}",
                        notification.created_at.format("%Y-%m-%d %H:%M"),
                        notification.title,
                        notification.body
                    );
                }
                Ok(())
            }
        }
    }
}

async fn show_stats(client: &DashboardClient, range: AnalyticsRange, daily: bool) -> Result<()> {
    let overview = client.analytics_overview(range).await?;
    println!("Last {range}:");
    println!("  Visits:           {}", overview.total_visits);
    println!("  Stamps:           {}", overview.total_stamps);
    println!("  Redemptions:      {}", overview.redemptions);
    println!("  Unique customers: {}", overview.unique_customers);

    if daily {
        for day in client.daily_visits(range).await? {
            println!("  {}  {:>5} visits  {:>5} stamps", day.date, day.visits, day.stamps);
        }
    }
    Ok(())
}

/// Fail early with a readable message instead of a 401
async fn require_session(client: &DashboardClient) -> Result<()> {
    if !client.can_resume().await? {
        bail!("not signed in; run `kcc login` first");
    }
    Ok(())
}

fn step_label(step: OnboardingStep) -> &'static str {
    match step {
        OnboardingStep::Profile => "complete the cafe profile",
        OnboardingStep::Verification => "set up stamp verification",
        OnboardingStep::Subscription => "activate a subscription",
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
