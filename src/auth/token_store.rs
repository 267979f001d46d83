use keyring::{Entry, Error as KeyringError};

use crate::{Error, Result};

const SERVICE: &str = "outlook_todo";

fn entry(client_id: &str) -> Result<Entry> {
    Entry::new(SERVICE, client_id).map_err(|e| Error::Keyring(client_id.to_string(), e))
}

/// Save a client secret into the keyring, keyed by client_id
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    entry(client_id)?
        .set_password(client_secret)
        .map_err(|e| Error::Keyring(client_id.to_string(), e))
}

/// Load client secret from keyring by client_id
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    match entry(client_id)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(Error::Keyring(client_id.to_string(), e)),
    }
}
