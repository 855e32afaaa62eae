use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::lenient;

/// Campaign attribution captured by the storefront and forwarded to UTMify.
///
/// Every field is optional; blank values are treated as absent so they never
/// reach the attribution payload or the stored `utm_params` column. Numeric
/// ids are accepted and kept as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TrackingParameters {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub src: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub sck: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub utm_source: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub utm_medium: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub utm_campaign: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub utm_content: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub utm_term: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub utm_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub xcod: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub fbclid: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub gclid: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string"
    )]
    pub ttclid: Option<String>,
}

impl TrackingParameters {
    /// Recognised parameter names, in payload order.
    pub const KEYS: [&'static str; 12] = [
        "src",
        "sck",
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_content",
        "utm_term",
        "utm_id",
        "xcod",
        "fbclid",
        "gclid",
        "ttclid",
    ];

    /// Collects recognised keys from a loose JSON object, ignoring the rest.
    ///
    /// Strings are trimmed; numbers are accepted and stringified since some
    /// ad platforms send numeric campaign ids.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut params = Self::default();
        for key in Self::KEYS {
            let value = match object.get(key) {
                Some(Value::String(s)) => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                params.set(key, value);
            }
        }
        params
    }

    /// Overlays `other` on top of `self`; non-empty values in `other` win.
    pub fn merge(mut self, other: TrackingParameters) -> Self {
        for (key, value) in other.entries() {
            self.set(key, value.to_string());
        }
        self
    }

    /// Present (non-empty) parameters as `(name, value)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        Self::KEYS
            .iter()
            .filter_map(|&key| {
                self.get(key)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (key, v))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// JSON object of the present parameters, as stored in `pedidos.utm_params`.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    /// Parses the stored column value. Malformed text yields empty parameters.
    pub fn from_stored(raw: Option<&str>) -> Self {
        raw.and_then(|text| serde_json::from_str::<Map<String, Value>>(text).ok())
            .map(|object| Self::from_json_object(&object))
            .unwrap_or_default()
    }

    fn get(&self, key: &str) -> Option<&str> {
        let field = match key {
            "src" => &self.src,
            "sck" => &self.sck,
            "utm_source" => &self.utm_source,
            "utm_medium" => &self.utm_medium,
            "utm_campaign" => &self.utm_campaign,
            "utm_content" => &self.utm_content,
            "utm_term" => &self.utm_term,
            "utm_id" => &self.utm_id,
            "xcod" => &self.xcod,
            "fbclid" => &self.fbclid,
            "gclid" => &self.gclid,
            "ttclid" => &self.ttclid,
            _ => return None,
        };
        field.as_deref()
    }

    fn set(&mut self, key: &str, value: String) {
        let field = match key {
            "src" => &mut self.src,
            "sck" => &mut self.sck,
            "utm_source" => &mut self.utm_source,
            "utm_medium" => &mut self.utm_medium,
            "utm_campaign" => &mut self.utm_campaign,
            "utm_content" => &mut self.utm_content,
            "utm_term" => &mut self.utm_term,
            "utm_id" => &mut self.utm_id,
            "xcod" => &mut self.xcod,
            "fbclid" => &mut self.fbclid,
            "gclid" => &mut self.gclid,
            "ttclid" => &mut self.ttclid,
            _ => return,
        };
        *field = Some(value);
    }
}
