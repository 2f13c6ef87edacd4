/// Cookie-based authentication gate
///
/// Reads the access-token cookie, resolves it to a stored user through the
/// session manager and makes that user available to handlers as
/// `web::ReqData<AuthenticatedUser>`.

use std::ops::Deref;
use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;

use crate::auth::{SessionManager, ACCESS_TOKEN_COOKIE};
use crate::domain::User;

/// The user behind the access token of the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl Deref for AuthenticatedUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

/// Protects a scope; every request without a valid access cookie for an
/// existing user is answered with 401.
pub struct AuthGuard {
    session: web::Data<SessionManager>,
}

impl AuthGuard {
    pub fn new(session: web::Data<SessionManager>) -> Self {
        Self { session }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGuardService {
            service: Rc::new(service),
            session: self.session.clone(),
        }))
    }
}

pub struct AuthGuardService<S> {
    service: Rc<S>,
    session: web::Data<SessionManager>,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .cookie(ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string());

        let service = self.service.clone();
        let session = self.session.clone();

        Box::pin(async move {
            let user = session.authenticate(token.as_deref()).await?;

            tracing::debug!(user_id = %user.id, "Access token validated successfully");
            req.extensions_mut().insert(AuthenticatedUser(user));

            service.call(req).await
        })
    }
}
