use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};

use crate::api::{ApiError, ForbiddenSnafu, TokenSnafu};
use crate::database::Record;
use crate::model::User;
use crate::time::Timestamp;

/// Claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    /// Key of the user record.
    pub sub: String,
    pub email: String,
    pub is_admin: bool,
    pub exp: i64,
}

impl Claims {
    pub fn user(&self) -> Record<User> {
        Record::new(self.sub.clone())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AuthError {
    #[snafu(display("token is not valid"))]
    Decode {
        source: jsonwebtoken::errors::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to issue a token"))]
    Encode {
        source: jsonwebtoken::errors::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("authorization header must be `Bearer <token>`"))]
    MalformedHeader {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("no token, authorization denied"))]
    MissingToken {
        #[snafu(implicit)]
        location: Location,
    },
}

/// Issues and verifies HS256 tokens.
#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: SecretString,
    validation: Validation,
    lifetime: Duration,
}

impl Authenticator {
    pub const ALGORITHM: Algorithm = Algorithm::HS256;
    pub const TOKEN_HEADER: &'static str = "x-auth-token";

    pub fn new(secret: SecretString) -> Self {
        Authenticator {
            secret,
            validation: Validation::new(Self::ALGORITHM),
            lifetime: Duration::hours(24),
        }
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    pub fn claims(&self, user: &User, now: Timestamp) -> Claims {
        Claims {
            sub: user.id.key(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            exp: (now + self.lifetime).timestamp(),
        }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&jsonwebtoken::Header::new(Self::ALGORITHM), claims, &self.encoding_key())
            .context(EncodeSnafu)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key(), &self.validation)
            .map(|data| data.claims)
            .context(DecodeSnafu)
    }

    /// Reads the token of a request, from `Authorization: Bearer <token>` or else from the bare
    /// [Authenticator::TOKEN_HEADER]. A request with neither header is anonymous, while a header that cannot be
    /// verified is an error.
    pub fn extract(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError> {
        let token = if let Some(header) = headers.get(header::AUTHORIZATION) {
            header
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix("Bearer "))
                .context(MalformedHeaderSnafu)?
        } else if let Some(header) = headers.get(Self::TOKEN_HEADER) {
            header.to_str().ok().context(MalformedHeaderSnafu)?
        } else {
            return Ok(None);
        };

        self.decode(token.trim()).map(Some)
    }
}

/// The caller's claims, when the request is authenticated.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn user(&self) -> Option<Record<User>> {
        self.0.as_ref().map(Claims::user)
    }
}

/// A request that must be authenticated.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

/// A request that must come from an administrator.
#[derive(Debug, Clone)]
pub struct Admin(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Authenticator::from_ref(state);
        let claims = authenticator.extract(&parts.headers).context(TokenSnafu)?;
        Ok(Viewer(claims))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Viewer(claims) = Viewer::from_request_parts(parts, state).await?;
        let claims = claims.context(MissingTokenSnafu).context(TokenSnafu)?;
        Ok(Authenticated(claims))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Admin
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(claims) = Authenticated::from_request_parts(parts, state).await?;
        snafu::ensure!(
            claims.is_admin,
            ForbiddenSnafu {
                message: "access denied: admin privileges required"
            }
        );
        Ok(Admin(claims))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::fixtures;

    fn authenticator() -> Authenticator {
        Authenticator::new(SecretString::new("test-secret".to_string()))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: "abc".into(),
            email: "fan@vrhub.test".into(),
            is_admin: false,
            exp,
        }
    }

    #[test]
    fn tokens_round_trip_through_the_header() {
        let auth = authenticator();
        let claims = claims((chrono::Utc::now() + Duration::hours(1)).timestamp());
        let token = auth.encode(&claims).unwrap();

        assert_eq!(auth.extract(&bearer(&token)).unwrap(), Some(claims.clone()));
        assert_eq!(claims.user().key(), "abc");
    }

    #[test]
    fn bare_token_header_is_accepted() {
        let auth = authenticator();
        let claims = claims((chrono::Utc::now() + Duration::hours(1)).timestamp());
        let token = auth.encode(&claims).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(Authenticator::TOKEN_HEADER, HeaderValue::from_str(&token).unwrap());
        assert_eq!(auth.extract(&headers).unwrap(), Some(claims));

        headers.insert(Authenticator::TOKEN_HEADER, HeaderValue::from_static("garbage"));
        assert!(matches!(auth.extract(&headers), Err(AuthError::Decode { .. })));
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert_eq!(authenticator().extract(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn bad_tokens_are_rejected() {
        let auth = authenticator();
        let expired = auth.encode(&claims(fixtures::at(0).timestamp())).unwrap();
        assert!(matches!(auth.extract(&bearer(&expired)), Err(AuthError::Decode { .. })));

        let foreign = Authenticator::new(SecretString::new("other".to_string()))
            .encode(&claims((chrono::Utc::now() + Duration::hours(1)).timestamp()))
            .unwrap();
        assert!(matches!(auth.extract(&bearer(&foreign)), Err(AuthError::Decode { .. })));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(matches!(auth.extract(&headers), Err(AuthError::MalformedHeader { .. })));
    }
}
