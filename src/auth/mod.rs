pub mod cleanup;
pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::{bearer_token, BearerToken, MaybeUser, RequireAdmin, RequireUser};
pub use password::{
    hash_password, validate_password_length, validate_password_strength, verify_password,
};
pub use token::{Claims, IssuedToken, TokenError, TokenKeys, TokenType};
