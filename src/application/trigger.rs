use subtle::ConstantTimeEq;

/// Credential check for the scheduled-update trigger.
///
/// Without a configured secret every request is refused.
#[derive(Clone)]
pub struct TriggerGuard {
    secret: Option<String>,
}

/// The credentials a trigger request presented.
#[derive(Debug, Default, Clone, Copy)]
pub struct TriggerCredentials<'a> {
    pub bearer: Option<&'a str>,
    pub query_secret: Option<&'a str>,
}

impl TriggerGuard {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// The bearer token wins; the `secret` query parameter is accepted when no header is sent.
    pub fn authorize(&self, credentials: TriggerCredentials<'_>) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            return false;
        };
        let presented = credentials.bearer.or(credentials.query_secret);
        match presented {
            Some(candidate) => constant_time_eq(secret, candidate),
            None => false,
        }
    }
}

fn constant_time_eq(expected: &str, candidate: &str) -> bool {
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> TriggerGuard {
        TriggerGuard::new(Some("s3cret".to_string()))
    }

    #[test]
    fn bearer_must_match_exactly() {
        let guard = guard();
        assert!(guard.authorize(TriggerCredentials {
            bearer: Some("s3cret"),
            query_secret: None,
        }));
        assert!(!guard.authorize(TriggerCredentials {
            bearer: Some("s3cre"),
            query_secret: None,
        }));
        assert!(!guard.authorize(TriggerCredentials {
            bearer: Some("s3cret!"),
            query_secret: None,
        }));
    }

    #[test]
    fn query_secret_is_accepted_for_compatibility() {
        assert!(guard().authorize(TriggerCredentials {
            bearer: None,
            query_secret: Some("s3cret"),
        }));
    }

    #[test]
    fn wrong_bearer_is_not_rescued_by_query_secret() {
        assert!(!guard().authorize(TriggerCredentials {
            bearer: Some("wrong"),
            query_secret: Some("s3cret"),
        }));
    }

    #[test]
    fn unset_secret_rejects_everything() {
        let guard = TriggerGuard::new(None);
        assert!(!guard.is_configured());
        assert!(!guard.authorize(TriggerCredentials {
            bearer: Some(""),
            query_secret: Some(""),
        }));
        assert!(!guard.authorize(TriggerCredentials::default()));
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
