/// Provider-specific quirks that influence how authorization URLs are assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderQuirks {
	/// Indicates whether every flow must carry a PKCE challenge.
	pub pkce_required: bool,
	/// Character used to join scopes when constructing `scope` parameters.
	pub scope_delimiter: char,
	/// Query parameter that carries the client identifier.
	pub client_id_param: &'static str,
	/// Optional `response_mode` value (Apple posts the result back as a form).
	pub response_mode: Option<&'static str>,
	/// Fragment appended to the authorization URL.
	pub fragment: Option<&'static str>,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self {
			pkce_required: false,
			scope_delimiter: ' ',
			client_id_param: "client_id",
			response_mode: None,
			fragment: None,
		}
	}
}
