use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::app_dir;
use crate::{Error, Result};

/// Non-secret token metadata stored in ~/.config/outlook_todo/tokens.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokensFile {
    pub client_id: String,
    pub access_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
}

pub fn tokens_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("tokens.json"))
}

/// Save access_token and expiry epoch for the given client
pub fn save_tokens(
    path: &Path,
    client_id: &str,
    access_token: Option<&str>,
    expires_at_epoch: Option<i64>,
) -> Result<()> {
    let tf = TokensFile {
        client_id: client_id.to_string(),
        access_token: access_token.map(|s| s.to_string()),
        expires_at_epoch,
    };
    let s = serde_json::to_string_pretty(&tf)
        .map_err(|e| Error::DecodeTokenCache(path.to_owned(), e))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::TokenCache(path.to_owned(), e))?;
    }
    fs::write(path, s).map_err(|e| Error::TokenCache(path.to_owned(), e))?;
    Ok(())
}

/// Load tokens file if present
pub fn load_tokens(path: &Path) -> Result<Option<TokensFile>> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::TokenCache(path.to_owned(), e)),
    };
    let tf: TokensFile =
        serde_json::from_str(&s).map_err(|e| Error::DecodeTokenCache(path.to_owned(), e))?;
    Ok(Some(tf))
}
