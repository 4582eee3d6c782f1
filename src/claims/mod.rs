pub mod error;
pub mod extractor;
pub mod middleware;
pub mod token;

// Re-export public types and functions
pub use error::ClaimError;
pub use extractor::TokenSource;
pub use middleware::{AnyDistribution, ClaimState, Entitled, claim_auth_middleware};
pub use token::{TokenClaims, decode_unverified};

/// Who is calling, as far as entitlements are concerned: the flat list of
/// groups and scopes taken from the caller's token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    claims: Vec<String>,
}

impl Principal {
    pub fn new(claims: Vec<String>) -> Self {
        Self { claims }
    }

    pub fn claims(&self) -> &[String] {
        &self.claims
    }

    pub fn has_claims(&self) -> bool {
        !self.claims.is_empty()
    }
}

impl From<TokenClaims> for Principal {
    fn from(claims: TokenClaims) -> Self {
        Self::new(claims.into_claims())
    }
}
