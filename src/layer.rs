use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{HeaderMap, HeaderValue, Request, Response, header};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    handle::{Outcome, SessionHandle},
    storage::SessionStorage,
};

/// Loads a [`SessionHandle`] for every request and writes the session back on the response.
#[derive(Debug)]
pub struct SessionManagerLayer<St> {
    storage: Arc<St>,
}

impl<St: SessionStorage> SessionManagerLayer<St> {
    pub fn new(storage: St) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Share a storage that is also used directly, e.g. from handlers via state.
    pub fn from_arc(storage: Arc<St>) -> Self {
        Self { storage }
    }
}

impl<St> Clone for SessionManagerLayer<St> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

#[derive(Debug)]
pub struct SessionManager<S, St> {
    inner: S,
    storage: Arc<St>,
}

impl<S: Clone, St> Clone for SessionManager<S, St> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<S, St> Layer<S> for SessionManagerLayer<St> {
    type Service = SessionManager<S, St>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionManager {
            inner,
            storage: self.storage.clone(),
        }
    }
}

/// All `Cookie` headers of a request joined into one, as HTTP/2 clients may split them.
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}

fn internal_error<B: Default>() -> Response<B> {
    let mut res = Response::default();
    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    res
}

impl<ReqBody, ResBody, S, St> Service<Request<ReqBody>> for SessionManager<S, St>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    St: SessionStorage,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let storage = self.storage.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let cookies = cookie_header(req.headers());
            let session = match storage.get_session(cookies.as_deref()).await {
                Ok(session) => session,
                Err(err) => {
                    tracing::error!(err = %err, "session load failed");
                    return Ok(internal_error());
                }
            };

            let handle = SessionHandle::new(session);
            req.extensions_mut().insert(handle.clone());

            let mut res = inner.call(req).await?;

            if res.status().is_server_error() {
                return Ok(res);
            }

            let set_cookie = match handle.take_outcome() {
                Outcome::Untouched => return Ok(res),
                Outcome::Commit(mut session) => storage.commit_session(&mut session, None).await,
                Outcome::Destroy(mut session) => {
                    storage.destroy_session(&mut session, None).await
                }
            };

            let set_cookie = match set_cookie {
                Ok(set_cookie) => set_cookie,
                Err(err) => {
                    tracing::error!(err = %err, "session save failed");
                    return Ok(internal_error());
                }
            };

            match HeaderValue::from_str(&set_cookie) {
                Ok(value) => {
                    res.headers_mut().append(header::SET_COOKIE, value);
                    Ok(res)
                }
                Err(err) => {
                    tracing::error!(err = %err, "session cookie is not a valid header value");
                    Ok(internal_error())
                }
            }
        })
    }
}
