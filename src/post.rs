use serde::{Deserialize, Serialize};

/// A short user-authored message
///
/// Posts carry no identifier of their own; the store assigns an opaque key
/// per entry (see [`crate::feed::PushId`]). Records written by older clients
/// used `username`, `handle` and `iconUrl`, which are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, alias = "username")]
    pub author_name: String,
    #[serde(default, alias = "handle")]
    pub author_handle: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "iconUrl")]
    pub avatar_url: String,
}

impl Post {
    pub fn new(
        author_name: impl Into<String>,
        author_handle: impl Into<String>,
        content: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            author_name: author_name.into(),
            author_handle: author_handle.into(),
            content: content.into(),
            avatar_url: avatar_url.into(),
        }
    }

    /// Post written by the signed-in user; name and handle are both the identity
    pub fn authored_by(identity: &str, content: impl Into<String>) -> Self {
        Self::new(identity, identity, content, "")
    }

    /// Decode one stored record, rejecting anything that is not a post-shaped object
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Post::deserialize(value).ok()
    }
}
