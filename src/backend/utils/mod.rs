pub mod config;
pub mod error;
pub mod rate_limit;
pub mod read_time;
pub(super) mod scheduled_tasks;
pub mod slugify;
pub mod validate;

/// Random 32 byte token in hex encoding, used for login sessions.
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}
