use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    config::{Config, CookiePolicy, SameSite, MAX_TOKEN_TTL_SECS, MIN_SECRET_LEN},
    error::AuthError,
    models::{
        auth::{Claims, TokenType},
        user::Role,
    },
    services::metrics,
};

/// Value of the `iss` claim on every token this service signs.
pub const ISSUER: &str = "gatekeeper";

/// Name of the session cookie carrying the access token.
pub const JWT_COOKIE_NAME: &str = "jwt";

/// Source of "now" for issuance and temporal validation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for deterministic expiry tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Cookie descriptor rendered into a `Set-Cookie` header value via `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: &'static str,
    pub value: String,
    pub path: &'static str,
    pub http_only: bool,
    pub max_age: i64,
    pub expires: DateTime<Utc>,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl std::fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}={}; Path={}; Max-Age={}; Expires={}",
            self.name,
            self.value,
            self.path,
            self.max_age,
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        )?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, "; SameSite={same_site}")?;
        }
        Ok(())
    }
}

fn check_ttl(ttl: Duration) -> Result<(), AuthError> {
    if ttl <= Duration::zero() {
        return Err(AuthError::Configuration("token ttl must be positive".into()));
    }
    if ttl != Duration::seconds(ttl.num_seconds()) {
        return Err(AuthError::Configuration("token ttl must be whole seconds".into()));
    }
    if ttl.num_seconds() as u64 > MAX_TOKEN_TTL_SECS {
        return Err(AuthError::Configuration(format!(
            "token ttl must be at most {MAX_TOKEN_TTL_SECS} seconds"
        )));
    }
    Ok(())
}

/// Why a token failed verification. Logged only; callers see `AuthError::InvalidToken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    Expired,
    NotYetValid,
    WrongType,
}

/// Issues and verifies HMAC-signed, purpose-tagged tokens.
///
/// Shared by reference between the auth middleware and the handlers that mint
/// tokens (login, register, password reset). Holds no mutable state.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
    cookie: CookiePolicy,
}

impl TokenService {
    /// Fails when the secret is too short to be a sensible HMAC key; this is a
    /// startup condition, not a per-request one.
    pub fn new(secret: &str, cookie: CookiePolicy) -> Result<Self, AuthError> {
        Self::with_clock(secret, cookie, Arc::new(SystemClock))
    }

    pub fn with_clock(
        secret: &str,
        cookie: CookiePolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Configuration(format!(
                "signing secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        // Only HMAC algorithms are accepted; anything else in the header is rejected
        // by `decode`. Temporal checks run against our own clock below.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
            cookie,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        Self::new(&config.jwt_secret, config.cookie)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// TTLs must be a positive whole number of seconds, at most one year.
    pub fn issue(
        &self,
        token_type: TokenType,
        ttl: Duration,
        subject: Uuid,
        role: Role,
    ) -> Result<String, AuthError> {
        self.sign(token_type, ttl, subject, role).map(|(token, _)| token)
    }

    /// Signs a token and returns it together with its expiry instant.
    fn sign(
        &self,
        token_type: TokenType,
        ttl: Duration,
        subject: Uuid,
        role: Role,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        check_ttl(ttl)?;

        let now = self.clock.now();
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Configuration("token expiry is out of range".into()))?;
        let claims = Claims {
            sub: subject,
            role,
            token_type,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        metrics::record_issued(token_type.as_str());
        Ok((token, expires))
    }

    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        self.check(token, expected).map_err(|reason| {
            tracing::debug!(?reason, expected = %expected, "token rejected");
            AuthError::InvalidToken
        })
    }

    fn check(&self, token: &str, expected: TokenType) -> Result<Claims, Rejection> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| Rejection::Malformed)?
            .claims;

        let now = self.clock.now().timestamp();
        if now < claims.nbf {
            return Err(Rejection::NotYetValid);
        }
        if now >= claims.exp {
            return Err(Rejection::Expired);
        }
        if claims.token_type != expected {
            return Err(Rejection::WrongType);
        }
        Ok(claims)
    }

    pub fn issue_as_cookie(
        &self,
        token_type: TokenType,
        ttl: Duration,
        subject: Uuid,
        role: Role,
    ) -> Result<SessionCookie, AuthError> {
        let (value, expires) = self.sign(token_type, ttl, subject, role)?;
        Ok(SessionCookie {
            name: JWT_COOKIE_NAME,
            value,
            path: "/",
            http_only: true,
            max_age: ttl.num_seconds(),
            expires,
            secure: self.cookie.secure,
            same_site: self.cookie.same_site,
        })
    }

    /// Expired, empty session cookie. Logout is entirely client-side: the token
    /// itself stays valid until its own expiry.
    pub fn delete_cookie(&self) -> SessionCookie {
        SessionCookie {
            name: JWT_COOKIE_NAME,
            value: String::new(),
            path: "/",
            http_only: true,
            max_age: 0,
            expires: DateTime::<Utc>::UNIX_EPOCH,
            secure: self.cookie.secure,
            same_site: self.cookie.same_site,
        }
    }
}
