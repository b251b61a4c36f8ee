use std::net::SocketAddr;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use cookie_session_storage::{
    Cookie, CookieConfig, MemorySessionStorage, MemoryStore, SameSite, SessionHandle,
    SessionManagerLayer,
};
use time::Duration;

async fn index(session: SessionHandle) -> String {
    let notice: Option<String> = session.get("notice").expect("session get succeeds");
    let visits: usize = session
        .get("visits")
        .expect("session get succeeds")
        .unwrap_or(0);
    session
        .set("visits", visits + 1)
        .expect("session insert succeeds");

    match (session.get::<String>("user").expect("session get succeeds"), notice) {
        (Some(user), Some(notice)) => format!("{notice}\nhello {user}, visits={visits}"),
        (Some(user), None) => format!("hello {user}, visits={visits}"),
        (None, _) => format!("not logged in, visits={visits}"),
    }
}

async fn login(session: SessionHandle) -> Redirect {
    session.set("user", "alice").expect("session insert succeeds");
    session
        .flash("notice", "logged in")
        .expect("session flash succeeds");
    Redirect::to("/")
}

async fn logout(session: SessionHandle) -> Redirect {
    session.destroy();
    Redirect::to("/")
}

#[tokio::main]
async fn main() {
    let cookie = Cookie::new(
        CookieConfig::new("__session")
            // Default: "/"
            .with_path("/")
            // Default: false
            .with_http_only(true)
            // Default: SameSite::Lax
            .with_same_site(SameSite::Strict)
            // Default: none, a browser-session cookie
            .with_max_age(Duration::hours(1))
            // Default: false (leave false for local HTTP development)
            .with_secure(false)
            // Default: no secrets, unsigned. The first secret signs; all of them verify.
            .with_secrets(["current-secret", "previous-secret"]),
    );
    let storage = MemorySessionStorage::new(cookie, MemoryStore::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .layer(SessionManagerLayer::new(storage));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
