//! Password hashing and session tokens
//!
//! Passwords are hashed with Argon2id and stored as PHC strings. Session
//! tokens are 32 random bytes, hex encoded; only their SHA-256 digest is
//! persisted.

use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use sha2::{Digest, Sha256};
use crate::error::AuthError;

const TOKEN_BYTES: usize = 32;

/// Password policy configuration
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    /// Characters that satisfy `require_special`
    pub special_chars: String,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl PasswordPolicy {
    pub fn strict() -> Self {
        Self {
            min_length: 12,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            special_chars: "!@#$%^&*()_+-=[]{}|;':\",./<>?`~".to_string(),
        }
    }

    /// Length checks only, for development and tests
    pub fn lenient() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
            special_chars: String::new(),
        }
    }

    /// Every rule the password breaks, or `Ok` if none.
    pub fn validate(&self, password: &str) -> Result<(), Vec<String>> {
        let length = password.chars().count();
        let has = |test: &dyn Fn(char) -> bool| password.chars().any(test);

        let rules: [(bool, String); 6] = [
            (
                length < self.min_length,
                format!("password must be at least {} characters", self.min_length),
            ),
            (
                length > self.max_length,
                format!("password must be at most {} characters", self.max_length),
            ),
            (
                self.require_uppercase && !has(&|c| c.is_ascii_uppercase()),
                "password must contain an uppercase letter".to_string(),
            ),
            (
                self.require_lowercase && !has(&|c| c.is_ascii_lowercase()),
                "password must contain a lowercase letter".to_string(),
            ),
            (
                self.require_digit && !has(&|c| c.is_ascii_digit()),
                "password must contain a digit".to_string(),
            ),
            (
                self.require_special && !has(&|c| self.special_chars.contains(c)),
                "password must contain a special character".to_string(),
            ),
        ];

        let broken: Vec<String> = rules
            .into_iter()
            .filter_map(|(violated, message)| violated.then_some(message))
            .collect();
        if broken.is_empty() {
            Ok(())
        } else {
            Err(broken)
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone)]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
    /// Hash length in bytes
    pub output_len: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
            output_len: 32,
        }
    }
}

impl Argon2Config {
    /// Cheap parameters for tests
    pub fn testing() -> Self {
        Self {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            output_len: 32,
        }
    }

    fn to_params(&self) -> Result<Params, AuthError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| AuthError::Password(format!("invalid argon2 parameters: {}", e)))
    }
}

pub struct PasswordService {
    argon2: Argon2<'static>,
    policy: PasswordPolicy,
}

impl PasswordService {
    pub fn new(config: Argon2Config, policy: PasswordPolicy) -> Result<Self, AuthError> {
        let params = config.to_params()?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2, policy })
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        self.policy
            .validate(password)
            .map_err(|errors| AuthError::Validation(errors.join("; ")))
    }

    /// Validate against the policy, then hash.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        self.validate_password(password)?;
        self.rehash(password)
    }

    /// Hash without the policy check, for upgrading a stored hash of a
    /// password that was already accepted once.
    pub fn rehash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Password(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// `Ok(false)` on a wrong password; `Err` only for unreadable hashes.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::Password(format!("unreadable password hash: {}", e)))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Password(e.to_string())),
        }
    }

    /// Whether a stored hash uses another algorithm or other cost parameters
    /// than this service would produce today.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        match Params::try_from(&parsed) {
            Ok(stored) => {
                let current = self.argon2.params();
                stored.m_cost() != current.m_cost()
                    || stored.t_cost() != current.t_cost()
                    || stored.p_cost() != current.p_cost()
            }
            Err(_) => true,
        }
    }
}

/// New random session token, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in place of the token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
