//! Firebase Authentication REST calls.
//!
//! Password sign-in goes through the Identity Toolkit API; refreshing an ID
//! token goes through the Secure Token API.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use fixit_core::{Email, Identity, IdentityId};

use super::FirebaseError;

/// Identity Toolkit password sign-in endpoint.
const SIGN_IN_ENDPOINT: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword";

/// Secure Token refresh endpoint.
const REFRESH_ENDPOINT: &str = "https://securetoken.googleapis.com/v1/token";

/// Seconds before expiry at which a token counts as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// ID token and refresh token for one signed-in user.
#[derive(Debug, Clone)]
pub struct FirebaseToken {
    /// Bearer token for Firestore requests.
    pub id_token: SecretString,
    /// Long-lived token used to mint new ID tokens.
    pub refresh_token: SecretString,
    /// Unix timestamp when the ID token expires.
    pub expires_at: i64,
    /// Firebase user id (`localId`).
    pub uid: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    /// Token lifetime in seconds, as a decimal string.
    expires_in: String,
    local_id: String,
    email: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Sign in with email and password.
///
/// Returns the identity Firebase reports along with its tokens.
///
/// # Errors
///
/// Returns `FirebaseError::Auth` with the Identity Toolkit error code when
/// the credentials are refused.
#[instrument(skip(client, api_key, password), fields(email = %email))]
pub async fn sign_in_with_password(
    client: &reqwest::Client,
    api_key: &SecretString,
    email: &Email,
    password: &SecretString,
) -> Result<(Identity, FirebaseToken), FirebaseError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(SIGN_IN_ENDPOINT)
        .query(&[("key", api_key.expose_secret())])
        .json(&SignInRequest {
            email: email.as_str(),
            password: password.expose_secret(),
            return_secure_token: true,
        })
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body: SignInResponse = response.json().await?;
    // Firebase normalises the address; fall back to what the user typed.
    let email = Email::parse(&body.email).unwrap_or_else(|_| email.clone());
    let identity = Identity::new(IdentityId::new(body.local_id.clone()), email);

    Ok((
        identity,
        FirebaseToken {
            id_token: SecretString::from(body.id_token),
            refresh_token: SecretString::from(body.refresh_token),
            expires_at: now + parse_expires_in(&body.expires_in),
            uid: body.local_id,
        },
    ))
}

/// Exchange a refresh token for a new ID token.
///
/// # Errors
///
/// Returns `FirebaseError::Auth` when the refresh token is revoked or the
/// user was disabled or deleted.
#[instrument(skip_all)]
pub async fn refresh_id_token(
    client: &reqwest::Client,
    api_key: &SecretString,
    refresh_token: &SecretString,
) -> Result<FirebaseToken, FirebaseError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(REFRESH_ENDPOINT)
        .query(&[("key", api_key.expose_secret())])
        .form(&RefreshRequest {
            grant_type: "refresh_token",
            refresh_token: refresh_token.expose_secret(),
        })
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    let body: RefreshResponse = response.json().await?;
    Ok(FirebaseToken {
        id_token: SecretString::from(body.id_token),
        refresh_token: SecretString::from(body.refresh_token),
        expires_at: now + parse_expires_in(&body.expires_in),
        uid: body.user_id,
    })
}

async fn error_from_response(response: reqwest::Response) -> FirebaseError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if (status == reqwest::StatusCode::BAD_REQUEST
        || status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN)
        && let Some(code) = error_code(&text)
    {
        return FirebaseError::Auth { code };
    }

    FirebaseError::Status {
        status: status.as_u16(),
        message: text,
    }
}

/// Extract the error code from an Identity Toolkit error body.
///
/// Messages look like `"INVALID_PASSWORD"` or
/// `"TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been ..."`.
fn error_code(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let code = envelope
        .error
        .message
        .split(" : ")
        .next()
        .unwrap_or_default()
        .trim()
        .to_owned();
    (!code.is_empty()).then_some(code)
}

fn parse_expires_in(value: &str) -> i64 {
    // Firebase always sends "3600"; treat anything unparsable as an hour.
    value.trim().parse().unwrap_or(3600)
}

impl FirebaseToken {
    /// Check if the ID token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(EXPIRY_BUFFER_SECS)
    }

    /// Check if the ID token will expire within the given number of seconds.
    #[must_use]
    pub fn expires_within(&self, seconds: i64) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - seconds
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token(expires_at: i64) -> FirebaseToken {
        FirebaseToken {
            id_token: SecretString::from("id"),
            refresh_token: SecretString::from("refresh"),
            expires_at,
            uid: "uid-1".to_string(),
        }
    }

    #[test]
    fn test_token_expiry_buffer() {
        let now = chrono::Utc::now().timestamp();

        assert!(token(now - 3600).is_expired());
        assert!(!token(now + 3600).is_expired());
        // Inside the 60 second buffer
        assert!(token(now + 30).is_expired());
        // Inside the refresh window but not expired
        assert!(token(now + 120).expires_within(300));
        assert!(!token(now + 120).is_expired());
    }

    #[test]
    fn test_error_code_strips_detail() {
        let body = r#"{"error":{"code":400,"message":"TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been temporarily disabled.","errors":[]}}"#;
        assert_eq!(error_code(body).as_deref(), Some("TOO_MANY_ATTEMPTS_TRY_LATER"));

        let body = r#"{"error":{"code":400,"message":"INVALID_LOGIN_CREDENTIALS"}}"#;
        assert_eq!(error_code(body).as_deref(), Some("INVALID_LOGIN_CREDENTIALS"));

        assert_eq!(error_code("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_sign_in_response_parses() {
        let json = r#"{
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "uid-1",
            "email": "admin@campus.edu",
            "displayName": "",
            "idToken": "eyJ...",
            "registered": true,
            "refreshToken": "AMf...",
            "expiresIn": "3600"
        }"#;
        let body: SignInResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.local_id, "uid-1");
        assert_eq!(parse_expires_in(&body.expires_in), 3600);
    }
}
