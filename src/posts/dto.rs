use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::posts::repo_types::{Comment, Post};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub description: String,
    pub image_public_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePostRequest {
    pub user_id: Option<Uuid>,
    pub description: Option<String>,
    pub image_public_id: Option<String>,
}

/// Body of requests that only identify the caller.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallerRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub user_id: Uuid,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCommentRequest {
    pub user_id: Option<Uuid>,
    /// `None` keeps the stored text.
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

impl PostWithComments {
    /// Groups `comments` under their posts, keeping the order of `posts`.
    pub fn attach(posts: Vec<Post>, comments: Vec<Comment>) -> Vec<Self> {
        let mut out: Vec<Self> = posts
            .into_iter()
            .map(|post| Self {
                post,
                comments: Vec::new(),
            })
            .collect();
        for c in comments {
            if let Some(p) = out.iter_mut().find(|p| p.post.id == c.post_id) {
                p.comments.push(c);
            }
        }
        out
    }
}
