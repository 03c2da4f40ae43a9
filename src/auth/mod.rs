//! Credentials for portal users.
//!
//! - Password hashing with Argon2, verification of older bcrypt hashes
//! - JWT issuance and verification

pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenService};
pub use password::{hash_password, needs_rehash, verify_password};
