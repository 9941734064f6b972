use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum password length accepted at registration and password change.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .context("Failed to hash password")?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its hash.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash).context("Failed to parse password hash")?;

    let argon2 = Argon2::default();

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Registration rule: at least eight characters with at least one letter
/// and one digit.
pub fn validate_password_strength(password: &str) -> Result<()> {
    validate_password_length(password)?;

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        anyhow::bail!("Password must contain at least one letter and one number");
    }

    Ok(())
}

/// Password change rule: length only.
pub fn validate_password_length(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        anyhow::bail!("Password must be at least {MIN_PASSWORD_LENGTH} characters long");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123!";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_password_strength_validation() {
        assert!(validate_password_strength("abcdefg1").is_ok());
        assert!(validate_password_strength("MyP@ssw0rd123").is_ok());

        // Too short
        assert!(validate_password_strength("abc123").is_err());
        // Letters only / digits only
        assert!(validate_password_strength("abcdefghij").is_err());
        assert!(validate_password_strength("1234567890").is_err());
    }

    #[test]
    fn test_password_length_only() {
        assert!(validate_password_length("abcdefgh").is_ok());
        assert!(validate_password_length("abcdefg").is_err());
    }
}
