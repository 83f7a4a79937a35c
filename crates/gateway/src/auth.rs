use {
    axum::http::{HeaderMap, header::AUTHORIZATION},
    secrecy::ExposeSecret,
    sha2::{Digest, Sha256},
};

use {switchboard_config::AuthConfig, switchboard_protocol::AuthContext};

struct TokenRecord {
    digest: [u8; 32],
    subject: String,
    scopes: Vec<String>,
}

/// Static bearer tokens mapped to caller identities. Only SHA-256 digests of
/// the configured tokens are kept in memory.
#[derive(Default)]
pub struct TokenAuth {
    tokens: Vec<TokenRecord>,
}

impl TokenAuth {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .filter(|t| !t.token.expose_secret().is_empty())
            .map(|t| TokenRecord {
                digest: sha256(t.token.expose_secret()),
                subject: t.subject.clone(),
                scopes: t.scopes.clone(),
            })
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Look up the identity bound to a raw bearer token.
    pub fn resolve_bearer(&self, token: &str) -> Option<AuthContext> {
        let digest = sha256(token);
        // Compare against every record so timing does not reveal the position.
        let mut found = None;
        for record in &self.tokens {
            if constant_time_eq(&record.digest, &digest) && found.is_none() {
                found = Some(record);
            }
        }
        found.map(|r| AuthContext::new(r.subject.clone()).with_scopes(r.scopes.iter().cloned()))
    }

    /// Resolve `Authorization: Bearer <token>`. Missing, malformed or unknown
    /// tokens yield `None`; the dispatcher decides whether that matters.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<AuthContext> {
        if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
            && let Some(token) = value.strip_prefix("Bearer ")
        {
            return self.resolve_bearer(token.trim());
        }
        None
    }
}

fn sha256(input: &str) -> [u8; 32] {
    Sha256::digest(input.as_bytes()).into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, axum::http::HeaderValue, secrecy::Secret, switchboard_config::ApiToken};

    fn auth() -> TokenAuth {
        TokenAuth::from_config(&AuthConfig {
            tokens: vec![
                ApiToken {
                    token: Secret::new("alice-token".into()),
                    subject: "alice".into(),
                    scopes: vec!["memory.write".into()],
                },
                ApiToken {
                    token: Secret::new(String::new()),
                    subject: "nobody".into(),
                    scopes: vec![],
                },
            ],
        })
    }

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn resolves_known_token() {
        let ctx = auth().from_headers(&headers("Bearer alice-token")).unwrap();
        assert_eq!(ctx.subject, "alice");
        assert!(ctx.has_scope("memory.write"));
    }

    #[test]
    fn rejects_unknown_or_malformed() {
        let auth = auth();
        assert!(auth.from_headers(&headers("Bearer wrong")).is_none());
        assert!(auth.from_headers(&headers("Basic alice-token")).is_none());
        assert!(auth.from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn empty_tokens_are_never_accepted() {
        let auth = auth();
        assert!(auth.resolve_bearer("").is_none());
        assert!(auth.from_headers(&headers("Bearer ")).is_none());
    }

    #[test]
    fn constant_time_eq_matches_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
