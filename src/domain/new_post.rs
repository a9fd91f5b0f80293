use url::Url;

use crate::domain::errors::MalformedInput;

/// A validated publish request. `title` and `post_url` are mandatory;
/// everything else defaults to the empty/false state.
#[derive(Clone, Debug)]
pub struct NewPost {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub post_url: Url,
    pub send_full: bool,
}

impl NewPost {
    pub fn new(
        title: Option<String>,
        excerpt: String,
        content: String,
        post_url: Option<String>,
        send_full: bool,
    ) -> Result<Self, MalformedInput> {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(MalformedInput::MissingTitle)?;
        let post_url = post_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(MalformedInput::MissingPostUrl)?;
        let post_url =
            Url::parse(&post_url).map_err(|_| MalformedInput::InvalidPostUrl { url: post_url })?;

        Ok(Self {
            title,
            excerpt,
            content,
            post_url,
            send_full,
        })
    }
}
