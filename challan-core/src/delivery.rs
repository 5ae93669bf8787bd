//! Outbound text delivery seam.

use async_trait::async_trait;

use crate::error::Result;

/// Hard cap the delivery channel accepts for one text message.
pub const MAX_TEXT_LENGTH: usize = 4000;

/// Channel that can deliver a text message to a reporter.
///
/// Implementations must be thread-safe. Failures surface as
/// `ChallanError::Delivery`; callers treat delivery as best-effort.
#[async_trait]
pub trait TextDelivery: Send + Sync {
    /// Send `body` to `recipient`. The body is already clipped to
    /// [`MAX_TEXT_LENGTH`] by the caller.
    async fn send_text(&self, recipient: &str, body: &str) -> Result<()>;
}

/// Clip a message body to the channel limit, on a character boundary.
pub fn clip_body(body: &str) -> String {
    if body.chars().count() <= MAX_TEXT_LENGTH {
        return body.to_string();
    }
    body.chars().take(MAX_TEXT_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_body_unchanged() {
        assert_eq!(clip_body("hello"), "hello");
    }

    #[test]
    fn test_long_body_clipped_to_limit() {
        let long = "a".repeat(MAX_TEXT_LENGTH + 100);
        let clipped = clip_body(&long);
        assert_eq!(clipped.chars().count(), MAX_TEXT_LENGTH);
    }

    #[test]
    fn test_clip_respects_multibyte_chars() {
        // ₹ is three bytes; clipping counts characters, not bytes.
        let long = "₹".repeat(MAX_TEXT_LENGTH + 5);
        let clipped = clip_body(&long);
        assert_eq!(clipped.chars().count(), MAX_TEXT_LENGTH);
        assert!(clipped.chars().all(|c| c == '₹'));
    }
}
