use cookie::Cookie as HttpCookie;
use serde::{Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

use crate::{
    config::{CookieConfig, CookieOptions},
    error::Result,
    format, sign,
};

/// A named cookie that reads values from `Cookie` headers and writes `Set-Cookie` headers.
///
/// Values are stored as JSON. When the cookie has secrets it is signed with the first one, and
/// any of them is accepted when reading so secrets can be rotated without logging users out.
#[derive(Debug, Clone)]
pub struct Cookie {
    config: CookieConfig,
}

impl Cookie {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    /// Shorthand for a cookie with default attributes.
    pub fn named(name: &'static str) -> Self {
        Self::new(CookieConfig::new(name))
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn config(&self) -> &CookieConfig {
        &self.config
    }

    pub fn is_signed(&self) -> bool {
        !self.config.secrets.is_empty()
    }

    /// The expiry a cookie serialized now would carry, if any.
    pub fn expires(&self) -> Option<OffsetDateTime> {
        self.config.effective_expires()
    }

    pub(crate) fn expires_with(&self, options: Option<&CookieOptions>) -> Option<OffsetDateTime> {
        self.config.with_overrides(options).effective_expires()
    }

    /// Read this cookie's value out of a `Cookie` header.
    ///
    /// Returns `None` when the header or cookie is missing, the value is empty, no secret
    /// verifies the signature, or the payload does not decode into `T`.
    pub fn parse<T: DeserializeOwned>(&self, header: Option<&str>) -> Option<T> {
        let raw = self.raw_value(header?)?;
        if raw.is_empty() {
            return None;
        }

        let payload = if self.is_signed() {
            match sign::unsign_any(&raw, self.config.secrets.as_slice()) {
                Some(payload) => payload,
                None => {
                    tracing::debug!(cookie = %self.name(), "cookie signature did not verify");
                    return None;
                }
            }
        } else {
            raw.as_str()
        };

        match format::decode_value(payload) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(cookie = %self.name(), err = %err, "cookie value decode failed");
                None
            }
        }
    }

    fn raw_value(&self, header: &str) -> Option<String> {
        HttpCookie::split_parse_encoded(header)
            .filter_map(|cookie| cookie.ok())
            .find(|cookie| cookie.name() == self.name())
            .map(|cookie| cookie.value().to_string())
    }

    /// Serialize `value` into a `Set-Cookie` header value, applying `options` on top of the
    /// configured attributes.
    pub fn serialize<T: Serialize + ?Sized>(
        &self,
        value: &T,
        options: Option<&CookieOptions>,
    ) -> Result<String> {
        self.serialize_expiring(value, options, self.expires_with(options))
    }

    /// Serialize with an expiry computed earlier by [`expires_with`](Self::expires_with).
    pub(crate) fn serialize_expiring<T: Serialize + ?Sized>(
        &self,
        value: &T,
        options: Option<&CookieOptions>,
        expires: Option<OffsetDateTime>,
    ) -> Result<String> {
        let mut payload = format::encode_value(value)?;
        if let Some(secret) = self.config.secrets.first() {
            payload = sign::sign(&payload, secret);
        }

        let cookie = self
            .config
            .with_overrides(options)
            .build_cookie_expiring(payload, expires);
        Ok(cookie.encoded().to_string())
    }

    /// A `Set-Cookie` header value that makes the client drop this cookie.
    pub fn expired(&self, options: Option<&CookieOptions>) -> String {
        self.config
            .with_overrides(options)
            .build_removal_cookie()
            .encoded()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::{Value, json};
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::SameSite;

    fn set_cookie(header: &str) -> HttpCookie<'static> {
        HttpCookie::parse_encoded(header.to_string()).expect("set-cookie parses successfully")
    }

    fn request_header(set_cookie_header: &str) -> String {
        let cookie = set_cookie(set_cookie_header);
        format!("{}={}", cookie.name(), cookie.value())
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Prefs {
        show_banner: bool,
    }

    #[test]
    fn user_prefs_round_trip() {
        let cookie = Cookie::new(CookieConfig::new("user-prefs").with_max_age(Duration::weeks(1)));
        let header = cookie
            .serialize(&Prefs { show_banner: true }, None)
            .expect("cookie serializes");

        assert_eq!(
            set_cookie(&header).max_age(),
            Some(Duration::seconds(604_800))
        );

        let prefs: Option<Prefs> = cookie.parse(Some(&header));
        assert_eq!(prefs, Some(Prefs { show_banner: true }));
        let prefs: Option<Prefs> = cookie.parse(Some(&request_header(&header)));
        assert_eq!(prefs, Some(Prefs { show_banner: true }));
    }

    #[test]
    fn round_trip_with_attributes() {
        let cookie = Cookie::new(
            CookieConfig::new("data")
                .with_domain("example.com")
                .with_http_only(true)
                .with_secure(true)
                .with_same_site(SameSite::Strict)
                .with_secrets(["s3cr3t"]),
        );

        for value in [json!("text"), json!(42), json!([1, 2, 3]), json!({ "a": { "b": null } })] {
            let header = cookie.serialize(&value, None).expect("cookie serializes");
            let parsed: Option<Value> = cookie.parse(Some(&request_header(&header)));
            assert_eq!(parsed, Some(value));
        }
    }

    #[test]
    fn missing_header_or_cookie() {
        let cookie = Cookie::named("data");

        assert_eq!(cookie.parse::<Value>(None), None);
        assert_eq!(cookie.parse::<Value>(Some("")), None);
        assert_eq!(cookie.parse::<Value>(Some("other=abc; more=def")), None);
        assert_eq!(cookie.parse::<Value>(Some("data=")), None);
    }

    #[test]
    fn finds_cookie_among_others() {
        let cookie = Cookie::named("data");
        let header = cookie.serialize(&json!(7), None).expect("cookie serializes");
        let value = set_cookie(&header).value().to_string();

        let parsed: Option<Value> = cookie.parse(Some(&format!("a=1; data={value}; b=2")));
        assert_eq!(parsed, Some(json!(7)));
    }

    #[test]
    fn malformed_values_are_absent() {
        let cookie = Cookie::named("data");

        assert_eq!(cookie.parse::<Value>(Some("data=%%%")), None);
        assert_eq!(cookie.parse::<Value>(Some("data=bm90IGpzb24")), None);
    }

    #[test]
    fn unsigned_cookie_rejected_when_signed() {
        let unsigned = Cookie::named("data");
        let signed = Cookie::new(CookieConfig::new("data").with_secrets(["s3cr3t"]));

        let header = unsigned.serialize(&json!("x"), None).expect("cookie serializes");
        assert_eq!(signed.parse::<Value>(Some(&request_header(&header))), None);
    }

    #[test]
    fn rotated_secrets_still_verify() {
        let old = Cookie::new(CookieConfig::new("data").with_secrets(["s1"]));
        let header = old.serialize(&json!({ "v": 1 }), None).expect("cookie serializes");
        let header = request_header(&header);

        let rotated = Cookie::new(CookieConfig::new("data").with_secrets(["s2", "s1"]));
        assert_eq!(rotated.parse(Some(&header)), Some(json!({ "v": 1 })));

        let new_header = rotated
            .serialize(&json!({ "v": 2 }), None)
            .expect("cookie serializes");
        assert_eq!(old.parse::<Value>(Some(&request_header(&new_header))), None);

        let dropped = Cookie::new(CookieConfig::new("data").with_secrets(["s3", "s2"]));
        assert_eq!(dropped.parse::<Value>(Some(&header)), None);
    }

    #[test]
    fn expiry_precedence() {
        let t1 = OffsetDateTime::now_utc() + Duration::days(30);
        let cookie = Cookie::new(
            CookieConfig::new("data")
                .with_expires(t1)
                .with_max_age(Duration::minutes(10)),
        );

        let header = cookie.serialize(&json!(1), None).expect("cookie serializes");
        let expires = set_cookie(&header)
            .expires_datetime()
            .expect("cookie has an expiry");
        let expected = OffsetDateTime::now_utc() + Duration::minutes(10);
        assert!((expires - expected).abs() <= Duration::seconds(2));
    }

    #[test]
    fn options_override_attributes() {
        let cookie = Cookie::new(CookieConfig::new("data").with_path("/a"));
        let options = CookieOptions::default()
            .with_path("/b")
            .with_max_age(Duration::seconds(30));

        let header = cookie
            .serialize(&json!(1), Some(&options))
            .expect("cookie serializes");
        let parsed = set_cookie(&header);

        assert_eq!(parsed.path(), Some("/b"));
        assert_eq!(parsed.max_age(), Some(Duration::seconds(30)));
    }

    #[test]
    fn expired_cookie_is_in_the_past() {
        let cookie = Cookie::new(CookieConfig::new("data").with_max_age(Duration::hours(1)));

        let header = cookie.expired(None);
        let parsed = set_cookie(&header);

        assert_eq!(parsed.value(), "");
        assert!(parsed.max_age().is_none());
        assert!(
            parsed
                .expires_datetime()
                .is_some_and(|expires| expires < OffsetDateTime::now_utc())
        );
        assert_eq!(cookie.parse::<Value>(Some(&request_header(&header))), None);
    }

    #[test]
    fn is_signed() {
        assert!(!Cookie::named("data").is_signed());
        assert!(Cookie::new(CookieConfig::new("data").with_secrets(["a"])).is_signed());
    }
}
