use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "driftwatch")]
#[command(about = "Browser drift tracking host and dashboard client")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding settings.json and the local state database
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Backend base URL (overrides settings and DRIFTWATCH_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the browser extension over stdin/stdout
    Host,

    /// Log in and remember the token
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and log in
    Signup {
        email: String,
        /// Read from stdin (twice) when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored token and tracking session
    Logout,

    /// Show the logged-in account
    Whoami,

    /// Time by category, top domains and drift timeline
    Report {
        /// Days to look back
        #[arg(short, long, default_value = "7")]
        days: u32,
        #[arg(long)]
        json: bool,
    },

    /// Unclassified domains, session productivity and drift patterns
    Insights {
        #[arg(long)]
        json: bool,
    },

    /// Manage domains that never count as drift
    #[command(subcommand)]
    Whitelist(WhitelistCommand),

    /// Administrator views
    #[command(subcommand)]
    Admin(AdminCommand),

    /// Show or change local settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum WhitelistCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        domain: String,
        #[arg(short, long, default_value = "")]
        reason: String,
    },
    Remove {
        domain_id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Usage statistics and accounts
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Delete an account and its data
    DeleteUser { user_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Persist a new backend URL
    SetApiUrl { url: String },
    /// Persist batching parameters
    SetBatching {
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        idle_flush_secs: Option<u64>,
        #[arg(long)]
        throttle_ms: Option<u64>,
    },
}
