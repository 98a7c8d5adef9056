use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

/// An image referenced by URL. The URL is either an embedded
/// `data:image/...` reference or a remote location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePart {
    pub url: String,
}

/// Where the bytes of an [`ImagePart`] live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Payload of a `data:image/...` URL, still base64 encoded.
    Embedded(&'a str),
    /// Anything else, passed along untouched.
    Remote(&'a str),
}

fn data_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^data:image[^,]*,(?P<data>.*)$").expect("data url regex is valid")
    })
}

impl ImagePart {
    pub fn source(&self) -> ImageSource<'_> {
        match data_url_regex().captures(&self.url) {
            Some(caps) => match caps.name("data") {
                Some(data) => ImageSource::Embedded(data.as_str()),
                None => ImageSource::Remote(&self.url),
            },
            None => ImageSource::Remote(&self.url),
        }
    }
}

/// One atomic unit of multimodal message content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text(TextPart),
    #[serde(rename = "image_url")]
    Image(ImagePart),
}

impl ContentPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text(TextPart { text: text.into() })
    }

    pub fn image<S: Into<String>>(url: S) -> Self {
        ContentPart::Image(ImagePart { url: url.into() })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(part) => Some(&part.text),
            ContentPart::Image(_) => None,
        }
    }
}
