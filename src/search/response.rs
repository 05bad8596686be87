use crate::post::Post;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Status {
    text: String,
    user: StatusUser,
}

#[derive(Debug, Deserialize)]
struct StatusUser {
    name: String,
    screen_name: String,
    profile_image_url: String,
}

impl From<Status> for Post {
    fn from(status: Status) -> Self {
        Post {
            author_name: status.user.name,
            author_handle: status.user.screen_name,
            content: status.text,
            avatar_url: status.user.profile_image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
}

/// Map a search response body into posts.
///
/// An empty body, invalid JSON, or a missing `statuses` array yields no posts;
/// individual statuses lacking a field are skipped.
pub fn parse_statuses(body: &str) -> Vec<Post> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let envelope: Value = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Search response is not JSON: {}", e);
            return Vec::new();
        }
    };

    let statuses = match envelope.get("statuses").and_then(Value::as_array) {
        Some(statuses) => statuses,
        None => {
            debug!("Search response has no statuses array");
            return Vec::new();
        }
    };

    let mut skipped = 0;
    let posts: Vec<Post> = statuses
        .iter()
        .filter_map(|entry| match Status::deserialize(entry) {
            Ok(status) => Some(Post::from(status)),
            Err(e) => {
                debug!("Skipping status entry: {}", e);
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        debug!("Skipped {} of {} statuses", skipped, statuses.len());
    }
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(text: &str, name: &str, handle: &str) -> Value {
        json!({
            "id": 1,
            "text": text,
            "user": {
                "name": name,
                "screen_name": handle,
                "profile_image_url": format!("http://img/{}.png", handle),
                "followers_count": 10
            }
        })
    }

    #[test]
    fn test_three_statuses_map_to_three_posts() {
        let body = json!({
            "statuses": [
                status("one", "Ann", "ann"),
                status("two", "Bob", "bob"),
                status("three", "Cy", "cy")
            ],
            "search_metadata": { "count": 3 }
        })
        .to_string();

        let posts = parse_statuses(&body);

        assert_eq!(posts.len(), 3);
        assert_eq!(
            posts[1],
            Post::new("Bob", "bob", "two", "http://img/bob.png")
        );
    }

    #[test]
    fn test_empty_and_invalid_bodies_yield_nothing() {
        assert!(parse_statuses("").is_empty());
        assert!(parse_statuses("   ").is_empty());
        assert!(parse_statuses("<html>rate limited</html>").is_empty());
        assert!(parse_statuses(r#"{"errors":[{"code":88}]}"#).is_empty());
        assert!(parse_statuses(r#"{"statuses":{}}"#).is_empty());
    }

    #[test]
    fn test_incomplete_status_is_skipped() {
        let body = json!({
            "statuses": [
                status("kept", "Ann", "ann"),
                { "text": "no user" },
                { "user": { "name": "x", "screen_name": "x", "profile_image_url": "" } }
            ]
        })
        .to_string();

        let posts = parse_statuses(&body);

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "kept");
    }
}
