use crate::api::error::err_response;
use crate::claims::{ClaimError, Principal, TokenSource, token};
use crate::store::ConfigStore;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::{debug, warn};

/// Coarse pre-filter run after claims are decoded and before any handler.
/// A `false` answer ends the request with 403.
pub trait Entitled: Send + Sync {
    fn entitled(&self, req: &Request, claims: &[String]) -> bool;
}

impl<F> Entitled for F
where
    F: Fn(&Request, &[String]) -> bool + Send + Sync,
{
    fn entitled(&self, req: &Request, claims: &[String]) -> bool {
        self(req, claims)
    }
}

/// Lets a principal through when its claims grant at least one distribution.
pub struct AnyDistribution(pub Arc<ConfigStore>);

impl Entitled for AnyDistribution {
    fn entitled(&self, _req: &Request, claims: &[String]) -> bool {
        !self.0.distributions_for_claims(claims).is_empty()
    }
}

/// Claim extraction settings shared by every request
#[derive(Clone)]
pub struct ClaimState {
    pub source: TokenSource,
    pub entitled: Option<Arc<dyn Entitled>>,
}

impl ClaimState {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            entitled: None,
        }
    }

    pub fn with_entitlement(mut self, entitled: Arc<dyn Entitled>) -> Self {
        self.entitled = Some(entitled);
        self
    }

    /// Resolve the principal behind `req`.
    pub fn authenticate(&self, req: &Request) -> Result<Principal, ClaimError> {
        let raw = self.source.extract(req.headers())?;
        let principal = Principal::from(token::decode_unverified(&raw)?);

        if let Some(entitled) = &self.entitled
            && !entitled.entitled(req, principal.claims())
        {
            return Err(ClaimError::NotEntitled);
        }

        Ok(principal)
    }
}

/// Attach the caller's [`Principal`] to the request, or stop the chain.
pub async fn claim_auth_middleware(
    State(claim_state): State<ClaimState>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = match claim_state.authenticate(&req) {
        Ok(principal) => principal,
        Err(err) => {
            warn!(uri = %req.uri(), error = %err, "Rejected request credentials");
            return err_response(err.to_err_code(), err.public_reason());
        }
    };

    debug!(claims = principal.claims().len(), "Claims attached to request");
    req.extensions_mut().insert(principal);
    next.run(req).await
}
