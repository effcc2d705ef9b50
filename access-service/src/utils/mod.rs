pub mod password;
pub mod validation;

pub use password::{Argon2Hasher, CredentialHasher, Password, PasswordHashString};
pub use validation::{validate_username, ValidatedJson};
