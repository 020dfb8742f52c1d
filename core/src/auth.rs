//! Token validation and access checks.
use tracing::{instrument, warn};

use crate::Error;

/// A token as handed out by the authentication service:
/// `<user>.<uid>.<gid>.<signature>`.
#[derive(Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub user: &'a str,
    pub uid: u32,
    pub gid: u32,
}

impl<'a> Token<'a> {
    pub fn parse(token: &'a str) -> Result<Self, Error> {
        let invalid = || Error::InvalidToken("malformed token".to_string());
        let mut parts = token.splitn(4, '.');
        let (Some(user), Some(uid), Some(gid), Some(signature)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if user.is_empty() || signature.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            user,
            uid: uid.parse().map_err(|_| invalid())?,
            gid: gid.parse().map_err(|_| invalid())?,
        })
    }
}

/// Decides whether a token grants access to a node.
#[derive(Clone, Debug)]
pub enum Authorizer {
    /// Only checks the shape of tokens, and matches the token's user against
    /// the owner and groups of a node.
    Local,
    /// Asks an external authorization service.
    Remote { url: String, client: reqwest::Client },
}

impl Authorizer {
    pub fn new(auth_url: Option<&str>) -> Self {
        match auth_url {
            None => Authorizer::Local,
            Some(url) => Authorizer::Remote {
                url: url.trim_end_matches('/').to_string(),
                client: reqwest::Client::new(),
            },
        }
    }

    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> Result<(), Error> {
        match self {
            Authorizer::Local => Token::parse(token).map(|_| ()),
            Authorizer::Remote { url, client } => {
                let resp = client
                    .get(format!("{}/isValidToken", url))
                    .query(&[("token", token)])
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    warn!(status = %resp.status(), "token rejected");
                    return Err(Error::PermissionDenied(
                        "the provided token is invalid".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Whether the token's holder is the owner or a member of one of the
    /// (comma separated) groups.
    #[instrument(skip(self, token))]
    pub async fn has_access(&self, token: &str, owner: &str, groups: &str) -> Result<bool, Error> {
        match self {
            Authorizer::Local => {
                let token = Token::parse(token)?;
                Ok(token.user == owner
                    || groups
                        .split(',')
                        .map(str::trim)
                        .any(|g| !g.is_empty() && g == token.user))
            }
            Authorizer::Remote { url, client } => {
                let resp = client
                    .get(format!("{}/hasAccess", url))
                    .query(&[("token", token), ("owner", owner), ("groups", groups)])
                    .send()
                    .await?;
                Ok(resp.status().is_success())
            }
        }
    }
}
