//! The tiddler: a titled, revisioned unit of content living in one bag.

use std::collections::BTreeMap;

use crate::storage::RevisionId;

/// Free-form key/value fields, kept sorted so serialization is stable.
pub type TiddlerFields = BTreeMap<String, String>;

/// A tiddler.
///
/// `text` holds raw bytes: UTF-8 for textual content types, the verbatim
/// payload for binary ones. `revision` is assigned by the store on every
/// successful put and is ignored when the tiddler is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tiddler {
    pub title: String,
    pub bag: String,
    pub text: Vec<u8>,
    /// Content type (MIME). `None` means plain tiddler text.
    pub content_type: Option<String>,
    pub tags: Vec<String>,
    pub fields: TiddlerFields,
    pub creator: String,
    pub created: String,
    pub modifier: String,
    pub modified: String,
    pub revision: Option<RevisionId>,
}

impl Tiddler {
    pub fn new(title: impl Into<String>, bag: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            bag: bag.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into().into_bytes();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = modifier.into();
        self
    }

    pub fn with_revision(mut self, revision: RevisionId) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into().into_bytes();
    }

    /// the text as UTF-8, if it is valid UTF-8
    pub fn text_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.text).ok()
    }
}
