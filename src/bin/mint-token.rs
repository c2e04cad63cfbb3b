/// Issue a signed token from the command line, for operators and manual testing.
///
/// Usage: mint-token --subject UUID [--role admin] [--token-type access] [--ttl-seconds 3600] [--cookie]
///   Reads JWT_SECRET from the environment (or .env).

use chrono::Duration;
use clap::Parser;
use uuid::Uuid;

use gatekeeper::{
    config::CookiePolicy,
    models::{auth::TokenType, user::Role},
    services::token::TokenService,
};

#[derive(Parser)]
#[command(name = "mint-token", about = "Issue a signed gatekeeper token")]
struct Args {
    /// Subject (user id) the token is issued for
    #[arg(long)]
    subject: Uuid,

    /// Role tag: admin, editor or user
    #[arg(long, default_value = "user")]
    role: String,

    /// Purpose: access, email-verify or password-reset
    #[arg(long, default_value = "access")]
    token_type: String,

    /// Lifetime in seconds
    #[arg(long, default_value_t = 3600)]
    ttl_seconds: i64,

    /// Print a Set-Cookie header value instead of the bare token
    #[arg(long)]
    cookie: bool,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args = Args::parse();
    let role: Role = args.role.parse()?;
    let token_type: TokenType = args.token_type.parse()?;
    let ttl = Duration::try_seconds(args.ttl_seconds)
        .ok_or_else(|| anyhow::anyhow!("--ttl-seconds is out of range"))?;

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("Missing required env var: JWT_SECRET"))?;
    let tokens = TokenService::new(&secret, CookiePolicy::default())?;

    if args.cookie {
        println!("{}", tokens.issue_as_cookie(token_type, ttl, args.subject, role)?);
    } else {
        println!("{}", tokens.issue(token_type, ttl, args.subject, role)?);
    }

    Ok(())
}
