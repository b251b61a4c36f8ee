use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{error::Result, session::Session};

/// Shared access to the request's [`Session`], inserted into request extensions by
/// [`SessionManagerLayer`](crate::SessionManagerLayer).
///
/// The layer commits the session after the handler returns if it was modified, or destroys
/// it if [`destroy`](Self::destroy) was called.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<HandleState>>,
}

#[derive(Debug)]
struct HandleState {
    session: Session,
    destroyed: bool,
}

pub(crate) enum Outcome {
    Untouched,
    Commit(Session),
    Destroy(Session),
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandleState {
                session,
                destroyed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        // Session operations can't leave the state half-updated, so a poisoned lock is usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Option<String> {
        self.lock().session.id().map(str::to_string)
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().session.has(key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.lock().session.get(key)
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.lock().session.get_value(key)
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        self.lock().session.set(key, value)
    }

    pub fn flash<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        self.lock().session.flash(key, value)
    }

    pub fn unset(&self, key: &str) {
        self.lock().session.unset(key);
    }

    /// Run `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.lock().session)
    }

    /// Delete the session when the response is sent.
    pub fn destroy(&self) {
        self.lock().destroyed = true;
    }

    pub(crate) fn take_outcome(&self) -> Outcome {
        let mut state = self.lock();
        let session = std::mem::take(&mut state.session);
        if state.destroyed {
            Outcome::Destroy(session)
        } else if session.is_modified() {
            Outcome::Commit(session)
        } else {
            Outcome::Untouched
        }
    }
}

#[cfg(feature = "axum")]
impl<S> axum_core::extract::FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = (http::StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionHandle>().cloned().ok_or((
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "session layer is not installed",
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn untouched_session() {
        let handle = SessionHandle::new(Session::new());
        assert!(handle.get_value("missing").is_none());

        assert!(matches!(handle.take_outcome(), Outcome::Untouched));
    }

    #[test]
    fn modified_session_is_committed() {
        let handle = SessionHandle::new(Session::new());
        handle.set("n", 1).expect("value serializes");

        let Outcome::Commit(mut session) = handle.take_outcome() else {
            panic!("expected a commit");
        };
        assert_eq!(session.get_value("n"), Some(json!(1)));
    }

    #[test]
    fn destroy_wins_over_changes() {
        let handle = SessionHandle::new(Session::new());
        handle.set("n", 1).expect("value serializes");
        handle.destroy();

        assert!(matches!(handle.take_outcome(), Outcome::Destroy(_)));
    }

    #[test]
    fn clones_share_the_session() {
        let handle = SessionHandle::new(Session::new());
        let clone = handle.clone();
        clone.flash("notice", "hi").expect("value serializes");

        assert!(handle.has("notice"));
        assert_eq!(handle.get::<String>("notice").expect("value decodes"), Some("hi".into()));
        assert!(!clone.has("notice"));
        assert!(handle.with(|session| session.is_modified()));
    }
}
