//! Auth token generation for containers embedding gadgets.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Default token length.
pub const AUTH_TOKEN_LEN: usize = 24;

/// Random, unguessable token to pass to a child as `rpctoken`.
#[must_use]
pub fn generate_auth_token() -> String {
    generate_auth_token_of_len(AUTH_TOKEN_LEN)
}

/// Random alphanumeric token of `len` characters.
#[must_use]
pub fn generate_auth_token_of_len(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
