//! Defensive filtering of image attachments before they are embedded.

use parley_core::ImageAttachment;
use tracing::warn;

/// Attachments that can be embedded inline. Invalid ones are logged and
/// dropped so the rest of the turn still goes through.
pub fn embeddable<'a>(images: &'a [ImageAttachment], provider: &str) -> Vec<&'a ImageAttachment> {
    images
        .iter()
        .filter(|image| match image.validate() {
            Ok(()) => true,
            Err(reason) => {
                warn!(
                    provider = %provider,
                    image = %image.name,
                    reason = %reason,
                    "Dropping image attachment"
                );
                false
            }
        })
        .collect()
}
