use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ErrorMessage;

/// Upper bound on password length, so a huge input cannot pin a CPU inside Argon2
const MAX_PASSWORD_LENGTH: usize = 64;

fn check_length(password: &str) -> Result<(), ErrorMessage> {
    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Hash a password with Argon2id and a fresh random salt
///
/// The result is a PHC string (`$argon2id$v=19$m=...$<salt>$<hash>`) that
/// carries its own salt and parameters, so it is the only thing stored for
/// any principal kind.
pub fn hash(password: impl Into<String>) -> Result<String, ErrorMessage> {
    let password = password.into();
    check_length(&password)?;

    let salt = SaltString::generate(&mut OsRng);
    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_password)
}

/// Check a password against a stored PHC hash
///
/// `Ok(false)` means a mismatch; `Err` means the input or the stored hash
/// is unusable.
pub fn compare(password: &str, hashed_password: &str) -> Result<bool, ErrorMessage> {
    check_length(password)?;

    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
