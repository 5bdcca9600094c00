//! Artifact descriptors: the unit of persistence and de-duplication.
//!
//! A descriptor is identified solely by its encoded form,
//! `"<title>%17<relative_link>"`. Two descriptors with equal encoded forms are
//! the same artifact.

use std::fmt;

use thiserror::Error;

/// Separator between title and link in the persisted form.
pub const DELIMITER: &str = "%17";
/// Route prefix under which produced files are served.
pub const MEDIA_ROUTE_PREFIX: &str = "/audio";
/// Every conversion writes to this file name inside the title's folder.
pub const OUTPUT_FILE_NAME: &str = "audio.mp3";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("entry does not contain the '{DELIMITER}' delimiter")]
    MissingDelimiter,
    #[error("entry splits into {0} fields, expected exactly 2")]
    FieldCount(usize),
    #[error("entry has an empty {0} field")]
    EmptyField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactDescriptor {
    title: String,
    relative_link: String,
}

impl ArtifactDescriptor {
    /// Build a descriptor from raw fields. Fails when a field is empty or
    /// contains the delimiter, since such a descriptor could not be decoded
    /// back from its persisted form.
    pub fn new(
        title: impl Into<String>,
        relative_link: impl Into<String>,
    ) -> Result<Self, DecodeError> {
        let title = title.into();
        let relative_link = relative_link.into();
        validate_field("title", &title)?;
        validate_field("link", &relative_link)?;
        Ok(Self {
            title,
            relative_link,
        })
    }

    /// Descriptor for a freshly converted title, linking to
    /// `/audio/<percent-encoded title>/audio.mp3`.
    pub fn for_title(title: &str) -> Result<Self, DecodeError> {
        Self::new(title, media_link(title, OUTPUT_FILE_NAME))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn relative_link(&self) -> &str {
        &self.relative_link
    }

    pub fn encode(&self) -> String {
        format!("{}{DELIMITER}{}", self.title, self.relative_link)
    }

    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = raw.split(DELIMITER).collect();
        match fields.as_slice() {
            [_] => Err(DecodeError::MissingDelimiter),
            [title, link] => Self::new(*title, *link),
            other => Err(DecodeError::FieldCount(other.len())),
        }
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Relative link a client uses to fetch `file_name` inside `folder`.
pub fn media_link(folder: &str, file_name: &str) -> String {
    format!(
        "{MEDIA_ROUTE_PREFIX}/{}/{}",
        urlencoding::encode(folder),
        urlencoding::encode(file_name)
    )
}

fn validate_field(name: &'static str, value: &str) -> Result<(), DecodeError> {
    if value.is_empty() {
        return Err(DecodeError::EmptyField(name));
    }
    if value.contains(DELIMITER) {
        return Err(DecodeError::FieldCount(value.split(DELIMITER).count() + 1));
    }
    Ok(())
}
