use anyhow::Result;
use clap::Parser;

use audit_trail::authorization::{AccessGate, AdminPrincipal};
use audit_trail::config::AppConfig;

/// Issue a signed admin credential for the audit review API
#[derive(Parser, Debug)]
#[command(name = "issue-admin-token", version)]
struct Args {
    /// Principal id (JWT subject)
    #[arg(short, long)]
    subject: String,

    /// Display name recorded on retraction records
    #[arg(short, long)]
    name: String,

    /// Role claim; must be one of the configured admin roles to pass the gate
    #[arg(short, long, default_value = "admin")]
    role: String,

    /// Lifetime in minutes
    #[arg(short, long, default_value_t = 60)]
    ttl_minutes: i64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load()?;

    if !config.auth.admin_roles.contains(&args.role) {
        eprintln!(
            "warning: role '{}' is not an admin role; the token will be rejected",
            args.role
        );
    }

    let gate = AccessGate::new(&config.auth);
    let principal = AdminPrincipal::new(args.subject, args.name, args.role);
    let token = gate.issue_token(&principal, chrono::Duration::minutes(args.ttl_minutes))?;

    println!("{}", token);
    Ok(())
}
