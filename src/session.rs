//! Session lifecycle management
//!
//! A [`Session`] is an immutable value: a token plus the absolute instant it
//! expires. [`SessionManager`] owns the authenticate flow and exposes
//! [`SessionManager::ensure_valid`], which returns its input unchanged while
//! the token is still live and transparently authenticates for a fresh one
//! otherwise. Callers check validity *before* every page fetch rather than
//! reacting to failures, so no fetch is wasted on an expired token.

use crate::config::SageConfig;
use crate::error::{Error, Result};
use crate::request::{Operation, build_request};
use crate::transport::Transport;
use crate::wire;
use chrono::{DateTime, Utc};

/// A time-limited gateway session
///
/// Replaced wholesale on renewal, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque session token embedded in query requests
    pub token: String,
    /// Absolute instant after which the gateway rejects the token
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is no longer usable at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Owns the authenticate flow and session renewal policy
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: SageConfig,
    transport: Transport,
}

impl SessionManager {
    /// New manager over the given transport and credentials
    pub fn new(config: SageConfig, transport: Transport) -> Self {
        Self { config, transport }
    }

    /// Authenticate and return a fresh session.
    ///
    /// A response missing the session id is an [`Error::Auth`]; a missing or
    /// unparseable `sessiontimeout` is [`Error::SessionTimeoutUnparseable`],
    /// fatal because renewal timing would be unknowable.
    pub async fn authenticate(&self) -> Result<Session> {
        let document = build_request(&self.config, None, &Operation::Authenticate)?;
        let body = self.transport.send(&document).await?;
        let session = parse_auth_response(&body)?;
        tracing::info!(expires_at = %session.expires_at, "obtained new session");
        Ok(session)
    }

    /// Return `session` unchanged if it is present and not expired;
    /// otherwise authenticate and return the fresh session.
    pub async fn ensure_valid(&self, session: Option<Session>) -> Result<Session> {
        match session {
            Some(session) if !session.is_expired(Utc::now()) => Ok(session),
            Some(_) => {
                tracing::info!("session token expired, renewing");
                self.authenticate().await
            }
            None => self.authenticate().await,
        }
    }
}

fn parse_auth_response(xml: &str) -> Result<Session> {
    let token = wire::first_element_text(xml, "sessionid")?
        .filter(|token| !token.trim().is_empty())
        .ok_or(Error::Auth {
            missing: "sessionid",
        })?;
    let raw_timeout = wire::first_element_text(xml, "sessiontimeout")?
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| Error::SessionTimeoutUnparseable {
            detail: "element <sessiontimeout> not present in response".to_string(),
        })?;
    let expires_at = parse_session_timeout(&raw_timeout)?;
    Ok(Session { token, expires_at })
}

/// Parse the gateway's session timeout into an absolute instant.
///
/// The gateway's offset representation is inconsistent about the colon
/// between hours and minutes; both `+05:00` and `+0500` are accepted and
/// yield the same instant.
pub fn parse_session_timeout(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%z")
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| Error::SessionTimeoutUnparseable {
            detail: format!("cannot parse {raw:?}: {e}"),
        })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(endpoint: &str) -> SageConfig {
        SageConfig {
            company_id: "acme".into(),
            user_id: "svc".into(),
            user_password: "pw".into(),
            sender_id: "sender".into(),
            sender_password: "pw".into(),
            endpoint: endpoint.into(),
            page_size: 1000,
            request_timeout_secs: 600,
            max_attempts: 3,
        }
    }

    fn auth_response(token: &str, timeout: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <response><operation>\
             <authentication><status>success</status>\
             <sessiontimeout>{timeout}</sessiontimeout></authentication>\
             <result><status>success</status><data><api>\
             <sessionid>{token}</sessionid>\
             <endpoint>https://api.intacct.com/ia/xml/xmlgw.phtml</endpoint>\
             </api></data></result>\
             </operation></response>"
        )
    }

    #[test]
    fn timeout_offsets_with_and_without_colon_are_identical_instants() {
        let with_colon = parse_session_timeout("2022-06-10T15:30:00+05:00").unwrap();
        let without_colon = parse_session_timeout("2022-06-10T15:30:00+0500").unwrap();
        assert_eq!(with_colon, without_colon);
        assert_eq!(with_colon.to_rfc3339(), "2022-06-10T10:30:00+00:00");
    }

    #[test]
    fn garbage_timeout_is_unparseable() {
        let err = parse_session_timeout("soon").unwrap_err();
        assert!(matches!(err, Error::SessionTimeoutUnparseable { .. }));
    }

    #[test]
    fn parses_token_and_expiry_from_auth_response() {
        let session =
            parse_auth_response(&auth_response("tok-9", "2022-06-10T15:30:00+0000")).unwrap();
        assert_eq!(session.token, "tok-9");
        assert_eq!(session.expires_at.to_rfc3339(), "2022-06-10T15:30:00+00:00");
    }

    #[test]
    fn missing_sessionid_is_an_auth_error() {
        let xml = "<response><operation><authentication>\
                   <sessiontimeout>2022-06-10T15:30:00+0000</sessiontimeout>\
                   </authentication></operation></response>";
        let err = parse_auth_response(xml).unwrap_err();
        assert!(matches!(
            err,
            Error::Auth {
                missing: "sessionid"
            }
        ));
    }

    #[test]
    fn missing_sessiontimeout_is_fatal_for_renewal_timing() {
        let xml = "<response><operation><result><data><api>\
                   <sessionid>tok-9</sessionid></api></data></result></operation></response>";
        let err = parse_auth_response(xml).unwrap_err();
        assert!(matches!(err, Error::SessionTimeoutUnparseable { .. }));
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        let session = Session {
            token: "tok".into(),
            expires_at: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - Duration::seconds(1)));
    }

    #[tokio::test]
    async fn ensure_valid_returns_live_session_without_network_traffic() {
        // Endpoint points nowhere; a live session must never hit it.
        let config = config_for("http://127.0.0.1:1/");
        let transport = Transport::new(&config).unwrap();
        let manager = SessionManager::new(config, transport);

        let session = Session {
            token: "tok-live".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        let kept = manager.ensure_valid(Some(session.clone())).await.unwrap();
        assert_eq!(kept, session);
    }

    #[tokio::test]
    async fn ensure_valid_renews_expired_session_with_one_authenticate() {
        let server = MockServer::start().await;
        let fresh_timeout = (Utc::now() + Duration::hours(1))
            .format("%Y-%m-%dT%H:%M:%S%z")
            .to_string();
        Mock::given(method("POST"))
            .and(body_string_contains("getAPISession"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(auth_response("tok-fresh", &fresh_timeout)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server.uri());
        let transport = Transport::new(&config).unwrap();
        let manager = SessionManager::new(config, transport);

        let stale = Session {
            token: "tok-stale".into(),
            expires_at: Utc::now() - Duration::minutes(5),
        };
        let renewed = manager.ensure_valid(Some(stale)).await.unwrap();
        assert_eq!(renewed.token, "tok-fresh");
        assert!(renewed.expires_at > Utc::now());
    }
}
