//! Short-link tokens: a six-character lowercase base-36 token mapped to a
//! long URL in the store. Collisions are handled by retrying with a fresh
//! token; the store's uniqueness constraint is the arbiter.

use chrono::Utc;
use rand::Rng;
use tracing::info;
use url::Url;

use crate::store::{MarketStore, StoreError};

pub const SHORT_TOKEN_LEN: usize = 6;
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_TOKEN_ATTEMPTS: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ShortenError {
    #[error("the supplied value is not an absolute http(s) URL")]
    InvalidUrl,
    #[error("could not find a free token after {0} attempts")]
    TokenSpaceExhausted(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn generate_token<R: Rng>(rng: &mut R) -> String {
    (0..SHORT_TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_long_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https" | "ftp"),
        Err(_) => false,
    }
}

/// Validates `long_url`, persists it under a fresh token, and returns the
/// token. A token collision with an existing row retries with a new token,
/// up to a small bound.
pub fn shorten(store: &mut MarketStore, long_url: &str) -> Result<String, ShortenError> {
    if !is_valid_long_url(long_url) {
        return Err(ShortenError::InvalidUrl);
    }

    let mut rng = rand::thread_rng();
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let token = generate_token(&mut rng);
        match store.insert_short_url(&token, long_url, &Utc::now().to_rfc3339()) {
            Ok(()) => {
                info!(
                    component = "shortener",
                    event = "shorten.created",
                    token = %token,
                    "stored short link"
                );
                return Ok(token);
            }
            Err(StoreError::DuplicateToken(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(ShortenError::TokenSpaceExhausted(MAX_TOKEN_ATTEMPTS))
}

/// Public URL a stored token resolves through.
pub fn share_url(public_base_url: &str, token: &str) -> String {
    format!("{}/share/{token}", public_base_url.trim_end_matches('/'))
}

pub fn resolve(store: &MarketStore, token: &str) -> Result<Option<String>, ShortenError> {
    Ok(store.lookup_short_url(token)?)
}
