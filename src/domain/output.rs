//! Decoding of the loosely shaped `output` and `error` fields of a provider job.

use serde_json::Value;

const DEFAULT_FAILURE_MESSAGE: &str = "Prediction failed";

/// A result reference in one of the shapes the provider is known to emit.
///
/// Decoding tries the cases in declaration order and takes the first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutput {
    /// An object exposing a `url` field.
    Accessor { url: String },
    /// A bare string reference.
    Bare(String),
    /// A non-empty list whose first element is the reference.
    Sequence(Vec<String>),
}

impl ProviderOutput {
    #[must_use]
    pub fn decode(value: &Value) -> Option<Self> {
        if let Some(url) = value
            .as_object()
            .and_then(|obj| obj.get("url"))
            .and_then(Value::as_str)
        {
            return Some(Self::Accessor {
                url: url.to_string(),
            });
        }

        if let Some(url) = value.as_str() {
            return Some(Self::Bare(url.to_string()));
        }

        if let Some(items) = value.as_array()
            && items.first().is_some_and(Value::is_string)
        {
            let refs = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            return Some(Self::Sequence(refs));
        }

        None
    }

    /// The primary reference. Empty strings count as absent.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        let url = match self {
            Self::Accessor { url } | Self::Bare(url) => url.as_str(),
            Self::Sequence(items) => items.first()?.as_str(),
        };
        (!url.is_empty()).then_some(url)
    }

    #[must_use]
    pub fn into_url(self) -> Option<String> {
        self.url().map(str::to_string)
    }
}

/// Human readable message for a failed or canceled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure(pub String);

impl ProviderFailure {
    /// Reads a string `error`, then `error.message`, else a generic message.
    #[must_use]
    pub fn decode(error: Option<&Value>) -> Self {
        let message = error.and_then(|err| {
            err.as_str()
                .or_else(|| err.get("message").and_then(Value::as_str))
                .filter(|msg| !msg.is_empty())
        });

        Self(message.unwrap_or(DEFAULT_FAILURE_MESSAGE).to_string())
    }

    #[must_use]
    pub fn into_message(self) -> String {
        self.0
    }
}
