use chrono::Utc;
use log::{debug, warn};
use std::cell::RefCell;
use std::path::PathBuf;

use crate::Result;
use crate::auth::oauth::{self, Credentials};
use crate::auth::tokens_file;

/// Tokens this close to expiry are renewed.
const EXPIRY_MARGIN_SECS: i64 = 60;
/// Lifetime assumed when the server omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3500;

struct CachedToken {
    access_token: String,
    expires_at_epoch: i64,
}

pub struct TokenManager {
    creds: Credentials,
    cache_path: Option<PathBuf>,
    cached: RefCell<Option<CachedToken>>,
}

impl TokenManager {
    /// `cache_path` is the token file shared between runs; `None`
    /// keeps tokens in memory only.
    pub fn new(creds: Credentials, cache_path: Option<PathBuf>) -> Self {
        Self {
            creds,
            cache_path,
            cached: RefCell::new(None),
        }
    }

    /// Returns a valid access token; requests a new one if needed.
    pub fn get_access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();

        // 1) in memory & not expired
        if let Some(tok) = self.cached.borrow().as_ref()
            && now < tok.expires_at_epoch - EXPIRY_MARGIN_SECS
        {
            return Ok(tok.access_token.clone());
        }

        // 2) cached on disk for the same client
        if let Some((at, exp)) = self.disk_token(now) {
            debug!("using cached access token (not expired)");
            self.remember(at.clone(), exp);
            return Ok(at);
        }

        // 3) otherwise ask the identity platform
        let t = oauth::request_app_token(&self.creds)?;
        let exp = t
            .expires_in
            .map(|s| now + s as i64)
            .unwrap_or(now + DEFAULT_LIFETIME_SECS);

        if let Some(path) = &self.cache_path
            && let Err(e) =
                tokens_file::save_tokens(path, &self.creds.client_id, Some(&t.access_token), Some(exp))
        {
            warn!("couldn't save token cache: {e}");
        }

        self.remember(t.access_token.clone(), exp);
        Ok(t.access_token)
    }

    /// Unexpired token from the cache file. An unreadable or corrupt
    /// file counts as no cache.
    fn disk_token(&self, now: i64) -> Option<(String, i64)> {
        let path = self.cache_path.as_ref()?;
        let tf = match tokens_file::load_tokens(path) {
            Ok(tf) => tf?,
            Err(e) => {
                warn!("ignoring token cache: {e}");
                return None;
            }
        };
        if tf.client_id != self.creds.client_id {
            return None;
        }
        match (tf.access_token, tf.expires_at_epoch) {
            (Some(at), Some(exp)) if now < exp - EXPIRY_MARGIN_SECS => Some((at, exp)),
            _ => None,
        }
    }

    fn remember(&self, access_token: String, expires_at_epoch: i64) {
        *self.cached.borrow_mut() = Some(CachedToken {
            access_token,
            expires_at_epoch,
        });
    }
}
