//! Service tags advertised by tagged handlers.
//!
//! A tag is a name/value capability descriptor (for example
//! `stat.space = 0.42` or `tag.vol = "/srv/vol1"`). Tags declared by tagged
//! handlers are cloned into the registry when the handler is registered,
//! then published in the service advertisement.

use serde::{Deserialize, Serialize};

/// Value carried by a [`ServiceTag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TagValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point value.
    Real(f64),
    /// Free text.
    Str(String),
    /// Value computed by the service at advertisement time.
    Macro {
        /// Macro kind, e.g. `"cpu"` or `"space"`.
        kind: String,
        /// Macro parameter, e.g. a volume path.
        param: String,
    },
}

/// A capability descriptor used for service advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTag {
    /// Tag name.
    pub name: String,
    /// Tag value.
    pub value: TagValue,
}

impl ServiceTag {
    /// Create a tag.
    pub fn new(name: impl Into<String>, value: TagValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Boolean tag.
    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, TagValue::Bool(value))
    }

    /// Integer tag.
    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, TagValue::Int(value))
    }

    /// Floating point tag.
    pub fn real(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, TagValue::Real(value))
    }

    /// Text tag.
    pub fn str(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, TagValue::Str(value.into()))
    }

    /// Macro tag.
    pub fn macro_tag(
        name: impl Into<String>,
        kind: impl Into<String>,
        param: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            TagValue::Macro {
                kind: kind.into(),
                param: param.into(),
            },
        )
    }
}
