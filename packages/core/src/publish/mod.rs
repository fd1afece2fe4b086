//! Publishing abstraction.

pub mod richtext;

use async_trait::async_trait;

use crate::error::AppError;

/// Trait for destinations that turn text into a public post.
///
/// Implementations own their authenticated session. Calls are not
/// idempotent: publishing the same text twice creates two posts.
#[async_trait]
pub trait Publisher {
    /// Get the name of this publisher.
    fn name(&self) -> &'static str;

    /// Submit one post. Any refusal surfaces as `PublishRejected`.
    async fn publish(&self, text: &str) -> Result<(), AppError>;
}
