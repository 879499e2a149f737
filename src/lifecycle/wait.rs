//! Save-status polling.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use super::ImageLifecycle;
use crate::observer::LifecycleObserver;
use crate::provider::{ImageRecord, Provider, ProviderError, ServerSession};

/// Result of waiting for a new image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SaveState {
    /// The image became active.
    Active(ImageRecord),
    /// The save timeout elapsed first; the image is left to the provider.
    TimedOut,
}

/// Roughly thirty years; stands in for timeouts too large for [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Instant at which a save started at `start` times out.
///
/// Saturates to a far-future instant instead of overflowing.
pub(super) fn save_deadline(start: Instant, save_timeout: Duration) -> Instant {
    start
        .checked_add(save_timeout)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

impl<P, O> ImageLifecycle<'_, P, O>
where
    P: Provider + ?Sized,
    O: LifecycleObserver + ?Sized,
{
    /// Polls `image_id` at the fixed interval until it is active or
    /// `deadline` has passed.
    pub(super) async fn wait_for_active(
        &self,
        session: &ServerSession,
        image_id: &str,
        deadline: Instant,
    ) -> Result<SaveState, ProviderError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(SaveState::TimedOut);
            }
            sleep(self.poll_interval.min(remaining)).await;

            let image = self.provider.get_image_status(session, image_id).await?;
            if image.active {
                return Ok(SaveState::Active(image));
            }
            debug!(%image_id, "image still saving");
        }
    }
}
