mod password;
mod token;

use argon2::password_hash::rand_core::{OsRng, RngCore};
use log::warn;
use thiserror::Error;
use crate::config::Config;

pub use password::{hash_password, AdminPassword};
pub use token::{Claims, TokenSigner, TOKEN_TTL_HOURS};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Incorrect password")]
    WrongPassword,

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Failed to encode token: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Password hash error: {0}")]
    Hash(String),
}

/// Login and token verification for the admin panel.
#[derive(Clone)]
pub struct AuthService {
    password: AdminPassword,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(password: AdminPassword, signer: TokenSigner) -> Self {
        Self { password, signer }
    }

    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let password = AdminPassword::from_credential(&config.admin_credential)?;
        let signer = match &config.jwt_secret {
            Some(secret) => TokenSigner::new(secret),
            None => {
                warn!("JWT_SECRET not set; using a random secret, sessions end when the process restarts");
                let mut secret = [0u8; 32];
                OsRng.fill_bytes(&mut secret);
                TokenSigner::new(secret)
            }
        };
        Ok(Self::new(password, signer))
    }

    pub fn login(&self, password: &str) -> Result<String, AuthError> {
        if !self.password.verify(password) {
            return Err(AuthError::WrongPassword);
        }
        self.signer.issue()
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.signer.verify(token)
    }
}
