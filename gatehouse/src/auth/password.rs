//! Password hashing using Argon2id
//!
//! The shared portal credential is stored as an Argon2id PHC string; the
//! plaintext never appears in configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use gatehouse::auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::default();
//!
//! let hash = hasher.hash("my_secure_password")?;
//!
//! assert!(hasher.verify("my_secure_password", &hash)?);
//! assert!(!hasher.verify("wrong_password", &hash)?);
//! ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::error::{Error, Result};

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy)]
pub struct PasswordParams {
    /// Memory cost in KiB
    pub memory_cost_kib: u32,
    /// Number of iterations
    pub time_cost: u32,
    /// Degree of parallelism
    pub parallelism: u32,
    /// Shortest password `hash` accepts
    pub min_password_length: usize,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_cost_kib: Params::DEFAULT_M_COST,
            time_cost: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
            min_password_length: 8,
        }
    }
}

/// Password hasher using Argon2id
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    min_password_length: usize,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::DEFAULT,
            min_password_length: PasswordParams::default().min_password_length,
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with custom cost parameters
    pub fn new(params: PasswordParams) -> Result<Self> {
        let argon_params = Params::new(
            params.memory_cost_kib,
            params.time_cost,
            params.parallelism,
            None,
        )
        .map_err(|e| Error::InvalidConfig(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            params: argon_params,
            min_password_length: params.min_password_length,
        })
    }

    /// Hash a password into a PHC string
    ///
    /// Fails if the password is shorter than the configured minimum.
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.len() < self.min_password_length {
            return Err(Error::BadRequest(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a PHC hash
    ///
    /// Cost parameters are read from the hash itself. Returns an error only
    /// when the hash is malformed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = parse_hash(hash)?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!(
                "Password verification failed: {}",
                e
            ))),
        }
    }

    /// Minimum password length accepted by `hash`
    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }
}

/// Check that a string is a well-formed PHC hash
pub fn validate_hash(hash: &str) -> Result<()> {
    parse_hash(hash).map(|_| ())
}

fn parse_hash(hash: &str) -> Result<PasswordHash<'_>> {
    PasswordHash::new(hash)
        .map_err(|e| Error::InvalidConfig(format!("Invalid password hash format: {}", e)))
}
