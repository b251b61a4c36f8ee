#![allow(dead_code)]

// Shared helpers for integration tests.
//
// These helpers parse `Set-Cookie` with the `cookie` crate and encode it back the way a browser
// would send it in a `Cookie` header.
use std::convert::Infallible;

use axum::body::Body;
use cookie::Cookie;
use cookie_session_storage::{
    Cookie as CookieContainer, CookieConfig, CookieSessionStorage, SessionHandle,
    SessionManagerLayer,
};
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;

pub const SECRET: &str = "s3cr3t";

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Basic handler used by many tests: write a single key into the session.
    let session = req
        .extensions()
        .get::<SessionHandle>()
        .cloned()
        .expect("request includes SessionHandle extension");

    session.set("foo", 42).expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Handler that does not access the session at all.
    Ok(Response::new(Body::empty()))
}

pub fn signed_cookie(name: &'static str) -> CookieContainer {
    CookieContainer::new(CookieConfig::new(name).with_secrets([SECRET]))
}

pub fn get_session_cookie(res: &Response<Body>) -> Cookie<'static> {
    // Convenience: parse the session cookie from a response.
    get_session_cookie_from_headers(res.headers())
}

pub fn get_session_cookie_from_headers(headers: &HeaderMap) -> Cookie<'static> {
    // Parse the `Set-Cookie` header into a `Cookie` structure.
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("response includes set-cookie header");
    let set_cookie = set_cookie
        .to_str()
        .expect("set-cookie header is valid utf-8");
    parse_set_cookie(set_cookie)
}

pub fn parse_set_cookie(set_cookie: &str) -> Cookie<'static> {
    Cookie::parse_encoded(set_cookie.to_string()).expect("set-cookie parses successfully")
}

pub fn cookie_header_value(cookie: &Cookie<'_>) -> String {
    // Encode a cookie for use in a `Cookie` request header.
    Cookie::new(cookie.name(), cookie.value())
        .encoded()
        .to_string()
}

pub fn request_header(set_cookie: &str) -> String {
    // What a browser sends back after receiving `set_cookie`.
    cookie_header_value(&parse_set_cookie(set_cookie))
}

pub fn make_cookie_layer(config: CookieConfig) -> SessionManagerLayer<CookieSessionStorage> {
    // Cookie-embedded session layer over `config`, signed with `SECRET`.
    SessionManagerLayer::new(CookieSessionStorage::new(CookieContainer::new(
        config.with_secrets([SECRET]),
    )))
}
