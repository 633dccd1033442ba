/// How a local target's response body is shown when the user enabled
/// `showWebhookResponseInConsole`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePreview {
    /// Pretty-printed JSON document.
    Json(String),
    /// A `text/*` body, verbatim.
    Text(String),
    /// Body of another content type that decoded as UTF-8.
    Other(String),
    /// Images are summarised by size only.
    Image { size: u64 },
    /// PDFs are summarised by size only.
    Pdf { size: u64 },
    /// Undecodable body of an unrecognised content type.
    Binary {
        content_type: Option<String>,
        size: u64,
    },
    /// Nothing to show.
    Empty,
}

impl ResponsePreview {
    /// Pick a rendering from the response's content type, falling back to
    /// the body itself when the type is unknown.
    ///
    /// Sizes prefer the advertised `content-length` and fall back to the
    /// number of bytes actually read.
    pub fn classify(content_type: Option<&str>, content_length: Option<u64>, body: &[u8]) -> Self {
        let size = content_length.unwrap_or(body.len() as u64);
        let ct = content_type.map(str::to_ascii_lowercase).unwrap_or_default();

        if ct.contains("image/") {
            return Self::Image { size };
        }
        if ct.contains("application/pdf") {
            return Self::Pdf { size };
        }
        if body.is_empty() {
            return Self::Empty;
        }

        if ct.contains("json") {
            return match serde_json::from_slice::<serde_json::Value>(body) {
                Ok(value) => Self::Json(
                    serde_json::to_string_pretty(&value)
                        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned()),
                ),
                Err(_) => Self::Text(String::from_utf8_lossy(body).into_owned()),
            };
        }
        if ct.starts_with("text/") {
            return Self::Text(String::from_utf8_lossy(body).into_owned());
        }

        match std::str::from_utf8(body) {
            Ok(text) => Self::Other(text.to_string()),
            Err(_) => Self::Binary {
                content_type: content_type.map(str::to_string),
                size,
            },
        }
    }
}
