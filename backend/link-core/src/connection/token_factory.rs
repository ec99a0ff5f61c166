//! Source of fresh credentials for (re)connection attempts.

use crate::credentials::CredentialPair;
use crate::error::AuthError;

use std::future::Future;

use futures_util::future::BoxFuture;

/// Asynchronously produces a current credential pair.
///
/// Called once before every (re)connection attempt. Implemented for async
/// closures and for [`RequestAuthenticator`](crate::authenticator::RequestAuthenticator),
/// which performs the credential exchange.
pub trait TokenFactory: Send + Sync + 'static {
    fn fetch(&self) -> BoxFuture<'static, Result<CredentialPair, AuthError>>;
}

impl<F, Fut> TokenFactory for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CredentialPair, AuthError>> + Send + 'static,
{
    fn fetch(&self) -> BoxFuture<'static, Result<CredentialPair, AuthError>> {
        Box::pin(self())
    }
}
