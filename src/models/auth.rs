use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Role;

/// Purpose a token was minted for. A token only verifies against its own purpose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    Access,
    EmailVerify,
    PasswordReset,
}

impl TokenType {
    pub const ALL: [TokenType; 3] = [TokenType::Access, TokenType::EmailVerify, TokenType::PasswordReset];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::EmailVerify => "email-verify",
            TokenType::PasswordReset => "password-reset",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenType::Access),
            "email-verify" => Ok(TokenType::EmailVerify),
            "password-reset" => Ok(TokenType::PasswordReset),
            _ => Err(anyhow::anyhow!("Unknown token type: {s}")),
        }
    }
}

/// Claims embedded in every signed token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub token_type: TokenType,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Identity bound by the authorization middleware. Handlers read it through the
/// extractor in `middleware::auth`; it is never taken from the body or query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl From<&Claims> for AuthenticatedUser {
    fn from(c: &Claims) -> Self {
        Self { user_id: c.sub, role: c.role }
    }
}

/// Per-route security declaration. An empty role list means any authenticated
/// caller; routes without a requirement are simply not guarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityRequirement {
    roles: Vec<Role>,
}

impl SecurityRequirement {
    pub fn authenticated() -> Self {
        Self { roles: Vec::new() }
    }

    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        Self { roles: roles.into_iter().collect() }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn permits(&self, role: Role) -> bool {
        self.roles.is_empty() || self.roles.contains(&role)
    }
}
