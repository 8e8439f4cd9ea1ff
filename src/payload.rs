//! Token-bearing payloads for submissions that bypass the request augmenter.
//!
//! A [`ProtectedPayload`] always carries the token field with a non-empty value. If no
//! token can be obtained, building fails instead of producing a body without it.
//! Structured fields are written as canonical JSON (object keys sorted at every level)
//! so the server decodes the same bytes for the same input. Binary parts pass through
//! untouched and can only be emitted as multipart.

// crates.io
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	config::CsrfConfig,
	error::PayloadError,
	obs::{self, OpOutcome, OpSpan, TokenOp},
	store::{TokenStore, global},
	token::TokenSecret,
};

/// One field value inside a payload.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
	/// Plain text, emitted verbatim.
	Text(String),
	/// Nested data, emitted as canonical JSON.
	Structured(Value),
	/// Raw bytes, emitted unmodified as a multipart file part.
	Binary(BinaryPart),
}

/// Binary multipart content.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryPart {
	/// Raw content.
	pub bytes: Vec<u8>,
	/// Optional file name reported to the server.
	pub file_name: Option<String>,
	/// Optional MIME type, for example `image/png`.
	pub mime: Option<String>,
}
impl BinaryPart {
	/// Wraps raw bytes without file name or MIME type.
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self { bytes: bytes.into(), file_name: None, mime: None }
	}

	/// Sets the file name.
	pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
		self.file_name = Some(file_name.into());

		self
	}

	/// Sets the MIME type.
	pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
		self.mime = Some(mime.into());

		self
	}
}
impl Debug for BinaryPart {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BinaryPart")
			.field("len", &self.bytes.len())
			.field("file_name", &self.file_name)
			.field("mime", &self.mime)
			.finish()
	}
}

/// Ordered set of caller fields, before the token is added.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
	fields: Vec<(String, FieldValue)>,
}
impl Payload {
	/// Creates an empty payload.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a text field.
	pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.field(name, FieldValue::Text(value.into()))
	}

	/// Appends an already-built JSON value.
	pub fn json(self, name: impl Into<String>, value: Value) -> Self {
		self.field(name, FieldValue::Structured(value))
	}

	/// Serializes `value` and appends it as a structured field.
	pub fn structured<T>(self, name: impl Into<String>, value: &T) -> Result<Self, PayloadError>
	where
		T: ?Sized + Serialize,
	{
		let name = name.into();
		let value = serde_json::to_value(value).map_err(|e| PayloadError::Serialization {
			field: name.clone(),
			message: e.to_string(),
		})?;

		Ok(self.field(name, FieldValue::Structured(value)))
	}

	/// Appends a binary part.
	pub fn binary(self, name: impl Into<String>, part: BinaryPart) -> Self {
		self.field(name, FieldValue::Binary(part))
	}

	/// Appends an arbitrary field.
	pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
		self.fields.push((name.into(), value));

		self
	}

	/// Number of caller fields.
	pub fn len(&self) -> usize {
		self.fields.len()
	}

	/// Returns `true` when no caller fields were added.
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

/// Builds payloads that embed the current token.
#[derive(Clone, Debug)]
pub struct PayloadBuilder {
	store: Arc<TokenStore>,
	field_name: String,
}
impl PayloadBuilder {
	/// Creates a builder backed by an explicit store.
	pub fn new(store: Arc<TokenStore>, config: &CsrfConfig) -> Self {
		Self { store, field_name: config.field_name.clone() }
	}

	/// Creates a builder backed by the process-wide store.
	pub fn from_global(config: &CsrfConfig) -> Result<Self> {
		Ok(Self::new(global::current()?, config))
	}

	/// Name of the token field.
	pub fn field_name(&self) -> &str {
		&self.field_name
	}

	/// Attaches the current token to `payload`.
	///
	/// Fails when no token can be obtained. A caller field with the token field's name is
	/// dropped in favor of the token.
	pub async fn build(&self, payload: Payload) -> Result<ProtectedPayload> {
		const OP: TokenOp = TokenOp::Payload;

		let span = OpSpan::new(OP, "build");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.store.get_token().await?;

				if token.value().is_empty() {
					return Err(Error::MalformedResponse { reason: "token value is empty".into() });
				}

				let mut fields = payload.fields;

				fields.retain(|(name, _)| {
					let collides = *name == self.field_name;

					if collides {
						tracing::debug!(
							field = %name,
							"Replacing a caller field with the CSRF token."
						);
					}

					!collides
				});

				Ok(ProtectedPayload {
					field_name: self.field_name.clone(),
					token: token.value().clone(),
					fields,
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(OP, OpOutcome::Failure),
		}

		result
	}
}

/// Payload with the token field in place, ready to encode.
#[derive(Clone, Debug, PartialEq)]
pub struct ProtectedPayload {
	field_name: String,
	token: TokenSecret,
	fields: Vec<(String, FieldValue)>,
}
impl ProtectedPayload {
	/// Token field name and value. The value must not be logged.
	pub fn token_field(&self) -> (&str, &str) {
		(&self.field_name, self.token.expose())
	}

	/// Caller fields, in insertion order, excluding the token field.
	pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
		self.fields.iter().map(|(name, value)| (name.as_str(), value))
	}

	/// Encodes as `application/x-www-form-urlencoded`, token first.
	pub fn to_urlencoded(&self) -> Result<String, PayloadError> {
		let mut serializer = form_urlencoded::Serializer::new(String::new());

		serializer.append_pair(&self.field_name, self.token.expose());

		for (name, value) in &self.fields {
			serializer.append_pair(name, &text_encoding(name, value, "urlencoded form data")?);
		}

		Ok(serializer.finish())
	}

	/// Encodes as a JSON object. Structured fields stay nested (canonicalized).
	pub fn to_json(&self) -> Result<Value, PayloadError> {
		let mut object = Map::new();

		object.insert(self.field_name.clone(), Value::String(self.token.expose().to_owned()));

		for (name, value) in &self.fields {
			let encoded = match value {
				FieldValue::Text(text) => Value::String(text.clone()),
				FieldValue::Structured(value) => canonicalize(value),
				FieldValue::Binary(_) =>
					return Err(PayloadError::BinaryNotEncodable {
						field: name.clone(),
						encoding: "JSON",
					}),
			};

			object.insert(name.clone(), encoded);
		}

		Ok(Value::Object(object))
	}

	/// Encodes as a multipart form, token first. Binary parts keep their bytes,
	/// file name, and MIME type.
	pub fn into_multipart(self) -> Result<Form, PayloadError> {
		let mut form = Form::new().text(self.field_name, self.token.expose().to_owned());

		for (name, value) in self.fields {
			form = match value {
				FieldValue::Binary(binary) => {
					let mut part = Part::bytes(binary.bytes);

					if let Some(file_name) = binary.file_name {
						part = part.file_name(file_name);
					}
					if let Some(mime) = binary.mime {
						part = part
							.mime_str(&mime)
							.map_err(|_| PayloadError::InvalidMime { field: name.clone(), mime })?;
					}

					form.part(name, part)
				},
				other => {
					let text = text_encoding(&name, &other, "multipart text")?;

					form.text(name, text)
				},
			};
		}

		Ok(form)
	}
}

fn text_encoding(
	name: &str,
	value: &FieldValue,
	encoding: &'static str,
) -> Result<String, PayloadError> {
	match value {
		FieldValue::Text(text) => Ok(text.clone()),
		FieldValue::Structured(value) =>
			serde_json::to_string(&canonicalize(value)).map_err(|e| PayloadError::Serialization {
				field: name.to_owned(),
				message: e.to_string(),
			}),
		FieldValue::Binary(_) =>
			Err(PayloadError::BinaryNotEncodable { field: name.to_owned(), encoding }),
	}
}

/// Rebuilds `value` with object keys inserted in sorted order at every depth.
///
/// `serde_json::Map` keeps insertion order once any crate in the build enables the
/// `preserve_order` feature, so key order is fixed here rather than left to the map type.
fn canonicalize(value: &Value) -> Value {
	match value {
		Value::Object(object) => {
			let mut entries = object.iter().collect::<Vec<_>>();

			entries.sort_by(|(a, _), (b, _)| a.cmp(b));

			Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect())
		},
		Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
		other => other.clone(),
	}
}
