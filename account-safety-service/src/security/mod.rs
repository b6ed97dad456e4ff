pub mod tokens;

pub use tokens::{generate_token, hash_token};
