use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use crate::auth::AuthError;
use crate::config::AdminCredential;

/// The panel's single admin credential, held only as an argon2 hash.
#[derive(Clone)]
pub struct AdminPassword {
    hash: String,
}

impl AdminPassword {
    pub fn from_credential(credential: &AdminCredential) -> Result<Self, AuthError> {
        match credential {
            AdminCredential::Plain(password) => Ok(Self {
                hash: hash_password(password)?,
            }),
            AdminCredential::Hashed(hash) => {
                PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
                Ok(Self { hash: hash.clone() })
            }
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_credential_is_hashed_and_verifies() {
        let password = AdminPassword::from_credential(&AdminCredential::Plain("hunter2".into())).unwrap();
        assert!(password.hash.starts_with("$argon2"));
        assert!(password.verify("hunter2"));
        assert!(!password.verify("hunter3"));
    }

    #[test]
    fn precomputed_hash_is_accepted() {
        let hash = hash_password("letmein").unwrap();
        let password = AdminPassword::from_credential(&AdminCredential::Hashed(hash)).unwrap();
        assert!(password.verify("letmein"));
    }

    #[test]
    fn invalid_hash_is_a_configuration_error() {
        let result = AdminPassword::from_credential(&AdminCredential::Hashed("plaintext".into()));
        assert!(matches!(result, Err(AuthError::Hash(_))));
    }
}
