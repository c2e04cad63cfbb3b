use std::env;
use std::time::Duration;

/// Minimum accepted length of the HMAC signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest lifetime any token may be issued with, in seconds (one year).
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SameSite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            _ => Err(anyhow::anyhow!("Unknown SameSite policy: {s}")),
        }
    }
}

/// Cookie flags applied to every session cookie the token service emits.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self { secure: false, same_site: Some(SameSite::Lax) }
    }
}

/// Token-bucket shape for one limiter: burst size plus one token per `refill_every`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub capacity: u32,
    pub refill_every: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub access_token_ttl: chrono::Duration,
    pub email_token_ttl: chrono::Duration,
    pub password_reset_ttl: chrono::Duration,
    pub cookie: CookiePolicy,
    pub login_rate: RateLimitSettings,
    pub verify_rate: RateLimitSettings,
    pub rate_limit_idle: Duration,
    /// `{token}` is substituted with the email-verify token.
    pub verify_url: String,
    /// `{token}` is substituted with the password-reset token.
    pub reset_url: String,
    pub cors_origins: Vec<String>,
    pub bcrypt_cost: u32,
    /// Seeded into the user directory at startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes long");
        }

        Ok(Self {
            jwt_secret,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT").unwrap_or_else(|_| "8888".into()).parse()?,
            access_token_ttl: token_ttl("ACCESS_TOKEN_TTL_SECONDS", 86_400)?,
            email_token_ttl: token_ttl("EMAIL_TOKEN_TTL_SECONDS", 3_600)?,
            password_reset_ttl: token_ttl("PASSWORD_RESET_TTL_SECONDS", 3_600)?,
            cookie: CookiePolicy {
                secure: env::var("COOKIE_SECURE")
                    .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
                same_site: Some(
                    env::var("COOKIE_SAME_SITE")
                        .unwrap_or_else(|_| "lax".into())
                        .parse()?,
                ),
            },
            login_rate: RateLimitSettings {
                capacity: env::var("LOGIN_RATE_BURST").unwrap_or_else(|_| "2".into()).parse()?,
                refill_every: seconds("LOGIN_RATE_REFILL_SECONDS", 60)?,
            },
            verify_rate: RateLimitSettings {
                capacity: env::var("VERIFY_RATE_BURST").unwrap_or_else(|_| "1".into()).parse()?,
                refill_every: seconds("VERIFY_RATE_REFILL_SECONDS", 60)?,
            },
            rate_limit_idle: seconds("RATE_LIMIT_IDLE_SECONDS", 600)?,
            verify_url: env::var("VERIFY_URL")
                .unwrap_or_else(|_| "http://localhost:5173/verify?token={token}".into()),
            reset_url: env::var("RESET_URL")
                .unwrap_or_else(|_| "http://localhost:5173/reset-password?token={token}".into()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            bcrypt_cost: env::var("BCRYPT_COST")
                .map(|v| v.parse())
                .unwrap_or(Ok(bcrypt::DEFAULT_COST))?,
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Configuration suitable for tests: fixed secret, default limits.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            host: "127.0.0.1".into(),
            port: 0,
            access_token_ttl: chrono::Duration::hours(24),
            email_token_ttl: chrono::Duration::hours(1),
            password_reset_ttl: chrono::Duration::hours(1),
            cookie: CookiePolicy::default(),
            login_rate: RateLimitSettings { capacity: 2, refill_every: Duration::from_secs(60) },
            verify_rate: RateLimitSettings { capacity: 1, refill_every: Duration::from_secs(60) },
            rate_limit_idle: Duration::from_secs(600),
            verify_url: "http://localhost/verify?token={token}".into(),
            reset_url: "http://localhost/reset-password?token={token}".into(),
            cors_origins: vec!["http://localhost:5173".into()],
            bcrypt_cost: 4,
            admin_email: None,
            admin_password: None,
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
}

fn seconds(key: &str, default: u64) -> anyhow::Result<Duration> {
    let secs: u64 = match env::var(key) {
        Ok(v) => v.parse().map_err(|e| anyhow::anyhow!("Invalid {key}: {e}"))?,
        Err(_) => default,
    };
    if secs == 0 {
        anyhow::bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

fn token_ttl(key: &str, default: u64) -> anyhow::Result<chrono::Duration> {
    let d = seconds(key, default)?;
    if d.as_secs() > MAX_TOKEN_TTL_SECS {
        anyhow::bail!("{key} must be at most {MAX_TOKEN_TTL_SECS} seconds");
    }
    chrono::Duration::from_std(d).map_err(|_| anyhow::anyhow!("{key} is out of range"))
}
