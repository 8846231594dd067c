//! User, principal and token types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account type slug (string identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountTypeSlug {
    Guest,
    Reader,
    Librarian,
    Admin,
    Group,
}

impl AccountTypeSlug {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTypeSlug::Guest => "guest",
            AccountTypeSlug::Reader => "reader",
            AccountTypeSlug::Librarian => "librarian",
            AccountTypeSlug::Admin => "admin",
            AccountTypeSlug::Group => "group",
        }
    }

    /// Role tier used for minimum-role checks
    pub fn tier(&self) -> u8 {
        match self {
            AccountTypeSlug::Guest | AccountTypeSlug::Group => 0,
            AccountTypeSlug::Reader => 1,
            AccountTypeSlug::Librarian => 2,
            AccountTypeSlug::Admin => 3,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, AccountTypeSlug::Librarian | AccountTypeSlug::Admin)
    }
}

impl std::fmt::Display for AccountTypeSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AccountTypeSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(AccountTypeSlug::Guest),
            "reader" => Ok(AccountTypeSlug::Reader),
            "librarian" => Ok(AccountTypeSlug::Librarian),
            "admin" => Ok(AccountTypeSlug::Admin),
            "group" => Ok(AccountTypeSlug::Group),
            _ => Err(format!("Invalid account type slug: {}", s)),
        }
    }
}

/// User status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum UserStatus {
    Active = 0,
    Blocked = 1,
    Deleted = 2,
}

impl From<i16> for UserStatus {
    fn from(v: i16) -> Self {
        match v {
            0 => UserStatus::Active,
            1 => UserStatus::Blocked,
            2 => UserStatus::Deleted,
            _ => UserStatus::Active,
        }
    }
}

impl From<Option<i16>> for UserStatus {
    fn from(v: Option<i16>) -> Self {
        v.map(UserStatus::from).unwrap_or(UserStatus::Active)
    }
}

/// The user performing an operation, as resolved by the user directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i32,
    pub account_type: AccountTypeSlug,
    pub status: UserStatus,
}

impl Principal {
    pub fn is_staff(&self) -> bool {
        self.account_type.is_staff()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// JWT claims. Only identify the user; roles are looked up on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}
