//! Response normalization helpers shared by the adapters.
//!
//! Providers disagree on how they signal failure. Some use HTTP status codes, others
//! answer `200 OK` and embed `errcode`/`errmsg`, `code`/`msg`, `ret`/`msg`, or an OAuth
//! `error` member in the body, and QQ may wrap any of those in a `callback( ... );`
//! envelope. The helpers here fold all of that into [`ProviderErrorContext`] so adapters
//! only decide which helper applies.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::ProviderFailure, http::ProviderResponse};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Provider-signalled failure details.
///
/// Only primitive data is kept (status, code, message, body preview) so callers can log or
/// match on it without depending on any HTTP client types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider error code (`error`, `errcode`, `code`, `sub_code`, ...).
	pub error_code: Option<String>,
	/// Human-readable provider message.
	pub error_message: Option<String>,
	/// Truncated response body for payloads without structured fields.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	/// Creates an empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the provider error code.
	pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
		self.error_code = Some(code.into());

		self
	}

	/// Adds the provider error message.
	pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
		self.error_message = Some(message.into());

		self
	}

	/// Adds a body preview, truncated to 256 characters.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}
impl Display for ProviderErrorContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("provider rejected the request")?;

		match (self.http_status, self.error_code.as_deref()) {
			(Some(status), Some(code)) => write!(f, " (HTTP {status}, code {code})")?,
			(Some(status), None) => write!(f, " (HTTP {status})")?,
			(None, Some(code)) => write!(f, " (code {code})")?,
			(None, None) => {},
		}

		match self.error_message.as_deref().or(self.body_preview.as_deref()) {
			Some(message) => write!(f, ": {message}"),
			None => Ok(()),
		}
	}
}

/// Truncates `body` to the preview limit, appending an ellipsis when cut.
pub(crate) fn truncate_preview(body: String) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

/// Decodes JSON bytes, reporting the failing path on mismatch.
pub(crate) fn parse_json<T>(body: &[u8], status: Option<u16>) -> Result<T, ProviderFailure>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ProviderFailure::Json { source, status })
}

/// Converts an already-checked JSON value into `T`.
pub(crate) fn from_value<T>(value: JsonValue, status: Option<u16>) -> Result<T, ProviderFailure>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(value).map_err(|source| ProviderFailure::Json { source, status })
}

/// Returns the JSON body after rejecting HTTP failures and embedded error markers.
///
/// Bodies wrapped in a `callback( ... );` envelope are unwrapped first.
pub(crate) fn checked_json(response: &ProviderResponse) -> Result<JsonValue, ProviderFailure> {
	let text = response.text();
	let parsed = serde_json::from_str::<JsonValue>(strip_callback(&text)).ok();

	if let Some(ctx) = parsed.as_ref().and_then(|value| embedded_error(value, response.status)) {
		return Err(ctx.into());
	}
	if !response.is_success() {
		return Err(status_rejection(response).into());
	}

	match parsed {
		Some(value) => Ok(value),
		None => parse_json(strip_callback(&text).as_bytes(), Some(response.status)),
	}
}

/// Builds a rejection for a non-success status, including any structured fields.
pub(crate) fn status_rejection(response: &ProviderResponse) -> ProviderErrorContext {
	let text = response.text();

	serde_json::from_str::<JsonValue>(strip_callback(&text))
		.ok()
		.and_then(|value| embedded_error(&value, response.status))
		.unwrap_or_else(|| {
			ProviderErrorContext::new()
				.with_http_status(response.status)
				.with_body_preview(text.into_owned())
		})
}

/// Detects the in-body error conventions used by the supported providers.
///
/// A zero (`0`/`"0"`) code counts as success; so does Alipay's `10000`.
pub(crate) fn embedded_error(value: &JsonValue, status: u16) -> Option<ProviderErrorContext> {
	const MARKERS: [(&str, &[&str]); 5] = [
		("errcode", &["errmsg"]),
		("error", &["error_description", "error_msg", "message"]),
		("sub_code", &["sub_msg", "msg"]),
		("code", &["message", "msg", "sub_msg"]),
		("ret", &["msg"]),
	];

	let object = value.as_object()?;

	MARKERS.iter().find_map(|(code_key, message_keys)| {
		let code = object.get(*code_key).and_then(failure_code)?;
		let mut ctx = ProviderErrorContext::new().with_http_status(status).with_error_code(code);

		if let Some(message) =
			message_keys.iter().find_map(|key| object.get(*key).and_then(JsonValue::as_str))
		{
			ctx = ctx.with_error_message(message);
		}

		Some(ctx)
	})
}

fn failure_code(value: &JsonValue) -> Option<String> {
	match value {
		JsonValue::Number(number) if number.as_i64() != Some(0) && number.as_i64() != Some(10000) =>
			Some(number.to_string()),
		JsonValue::String(code) if !code.is_empty() && code != "0" && code != "10000" =>
			Some(code.to_owned()),
		_ => None,
	}
}

/// Strips a JSONP-style `name( ... );` wrapper, returning the inner text.
///
/// Bare JSON (or anything without a balanced wrapper) is returned trimmed.
pub(crate) fn strip_callback(body: &str) -> &str {
	let trimmed = body.trim();

	if trimmed.starts_with('{') || trimmed.starts_with('[') {
		return trimmed;
	}

	match (trimmed.find('('), trimmed.rfind(')')) {
		(Some(start), Some(end)) if start < end => trimmed[start + 1..end].trim(),
		_ => trimmed,
	}
}

/// Parses a `k=v&...` token body.
pub(crate) fn parse_query_text(body: &str) -> BTreeMap<String, String> {
	url::form_urlencoded::parse(body.trim().as_bytes()).into_owned().collect()
}

/// Decodes the payload of a compact JWT without verifying its signature.
///
/// Callers only use this on tokens received directly from the provider's token endpoint
/// over a server-to-server channel.
pub(crate) fn decode_jwt_payload(token: &str) -> Result<serde_json::Map<String, JsonValue>, ProviderFailure> {
	let mut segments = token.split('.');
	let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
		(Some(_), Some(payload), Some(_), None) => payload,
		_ => return Err(ProviderFailure::malformed("ID token is not a compact JWT", None)),
	};
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|e| ProviderFailure::malformed(format!("ID token payload is not base64url ({e})"), None))?;

	parse_json(&bytes, None)
}

/// Reads a string-or-number member as text; anything else yields an empty string.
pub(crate) fn text_field(value: &JsonValue, key: &str) -> String {
	match value.get(key) {
		Some(JsonValue::String(text)) => text.to_owned(),
		Some(JsonValue::Number(number)) => number.to_string(),
		_ => String::new(),
	}
}

/// Returns the first non-empty candidate.
pub(crate) fn first_non_empty<'a, I>(candidates: I) -> String
where
	I: IntoIterator<Item = &'a str>,
{
	candidates.into_iter().find(|candidate| !candidate.is_empty()).unwrap_or_default().to_owned()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> ProviderResponse {
		ProviderResponse { status, body: body.as_bytes().to_vec() }
	}

	#[test]
	fn callback_wrappers_are_stripped() {
		assert_eq!(strip_callback("callback( {\"openid\":\"abc123\"} );"), "{\"openid\":\"abc123\"}");
		assert_eq!(strip_callback("  {\"openid\":\"x\"}\n"), "{\"openid\":\"x\"}");
		assert_eq!(strip_callback("access_token=abc"), "access_token=abc");

		let value: JsonValue = serde_json::from_str(strip_callback("callback( {\"openid\":\"abc123\"} );"))
			.expect("Unwrapped callback should be JSON.");

		assert_eq!(value["openid"], "abc123");
	}

	#[test]
	fn embedded_codes_are_detected_under_http_ok() {
		let wechat = checked_json(&response(200, r#"{"errcode":40029,"errmsg":"invalid code"}"#))
			.expect_err("WeChat errcode must be rejected.");

		assert!(matches!(
			&wechat,
			ProviderFailure::Rejected(ctx)
				if ctx.error_code.as_deref() == Some("40029")
					&& ctx.error_message.as_deref() == Some("invalid code")
		));

		let qq = checked_json(&response(
			200,
			"callback( {\"error\":100019,\"error_description\":\"code to access token error\"} );",
		))
		.expect_err("Wrapped QQ errors must be rejected.");

		assert!(matches!(&qq, ProviderFailure::Rejected(ctx) if ctx.error_code.as_deref() == Some("100019")));
		assert!(checked_json(&response(200, r#"{"code":0,"msg":"ok","data":{}}"#)).is_ok());
		assert!(checked_json(&response(200, r#"{"code":"10000","msg":"Success"}"#)).is_ok());
		assert!(checked_json(&response(200, r#"{"errcode":0,"openid":"o"}"#)).is_ok());
	}

	#[test]
	fn non_success_status_keeps_a_preview() {
		let body = "x".repeat(300);
		let ctx = status_rejection(&response(502, &body));

		assert_eq!(ctx.http_status, Some(502));
		assert_eq!(ctx.body_preview.as_ref().map(|preview| preview.chars().count()), Some(257));
		assert!(ctx.to_string().starts_with("provider rejected the request (HTTP 502): xxx"));
	}

	#[test]
	fn malformed_json_reports_path() {
		#[derive(Debug, Deserialize)]
		struct Profile {
			#[allow(dead_code)]
			id: u64,
		}

		let err = parse_json::<Profile>(br#"{"id":"nope"}"#, Some(200))
			.expect_err("String ids should not decode as u64.");

		assert!(err.to_string().contains("`id`"));
	}

	#[test]
	fn query_text_bodies_decode() {
		let pairs = parse_query_text("access_token=AT%2B1&expires_in=7776000&refresh_token=RT\n");

		assert_eq!(pairs.get("access_token").map(String::as_str), Some("AT+1"));
		assert_eq!(pairs.get("expires_in").map(String::as_str), Some("7776000"));
	}

	#[test]
	fn jwt_payload_decodes_without_verification() {
		let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"001","email":"a@b.com"}"#);
		let claims = decode_jwt_payload(&format!("eyJhbGciOiJub25lIn0.{payload}.sig"))
			.expect("Payload should decode.");

		assert_eq!(claims.get("sub").and_then(JsonValue::as_str), Some("001"));
		assert!(decode_jwt_payload("only.two").is_err());
	}

	#[test]
	fn text_fields_accept_numbers() {
		let value = serde_json::json!({ "id": 42, "login": "octo", "name": null });

		assert_eq!(text_field(&value, "id"), "42");
		assert_eq!(text_field(&value, "name"), "");
		assert_eq!(first_non_empty([text_field(&value, "name").as_str(), "octo"]), "octo");
	}
}
