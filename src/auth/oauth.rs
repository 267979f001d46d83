use log::debug;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};

use crate::{Error, Result};

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tokens returned by the oauth flow (in-memory)
pub struct Tokens {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

/// App credentials registered in the tenant directory.
#[derive(Clone)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Client-credentials grant: exchanges the app secret for an
/// app-only access token.
pub fn request_app_token(creds: &Credentials) -> Result<Tokens> {
    let auth_url = AuthUrl::new(format!("{AUTHORITY}/{}/oauth2/v2.0/authorize", creds.tenant_id))
        .map_err(|e| Error::Authentication(e.to_string()))?;
    let token_url = TokenUrl::new(format!("{AUTHORITY}/{}/oauth2/v2.0/token", creds.tenant_id))
        .map_err(|e| Error::Authentication(e.to_string()))?;

    let oauth_client = BasicClient::new(
        ClientId::new(creds.client_id.clone()),
        Some(ClientSecret::new(creds.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody);

    debug!("requesting app token for client {}", creds.client_id);
    let token = oauth_client
        .exchange_client_credentials()
        .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
        .request(http_client)
        .map_err(|e| Error::Authentication(e.to_string()))?;

    Ok(Tokens {
        access_token: token.access_token().secret().to_string(),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}
