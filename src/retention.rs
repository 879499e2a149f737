//! Retention decisions over a server's image set.
//!
//! Pure functions only: the lifecycle feeds in the listing and the current
//! time and acts on the answer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::provider::ImageRecord;

/// Retention window applied to one server's images.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetentionPolicy {
    retain_window: Duration,
}

impl RetentionPolicy {
    /// Creates a policy that keeps active images for `retain_window`.
    #[must_use]
    pub const fn new(retain_window: Duration) -> Self {
        Self { retain_window }
    }

    /// Oldest `updated_at` an active image may carry and still count as fresh.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = TimeDelta::from_std(self.retain_window).unwrap_or(TimeDelta::MAX);
        now.checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Returns `true` when a new image should be requested.
    ///
    /// That is the case when no active image was updated within the window
    /// and no image is still saving.
    #[must_use]
    pub fn should_create(&self, images: &[ImageRecord], now: DateTime<Utc>) -> bool {
        let cutoff = self.cutoff(now);
        !has_pending(images)
            && !images
                .iter()
                .any(|image| image.active && image.updated_at >= cutoff)
    }

    /// Returns the active images that fell out of the window, oldest first.
    ///
    /// `exclude` names an image id that must survive regardless of age,
    /// normally the one created during the current run.
    #[must_use]
    pub fn stale_images(
        &self,
        images: &[ImageRecord],
        now: DateTime<Utc>,
        exclude: Option<&str>,
    ) -> Vec<ImageRecord> {
        let cutoff = self.cutoff(now);
        let mut stale: Vec<ImageRecord> = images
            .iter()
            .filter(|image| image.active && image.updated_at < cutoff)
            .filter(|image| exclude != Some(image.id.as_str()))
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        stale
    }
}

/// Splits a listing into active and still-saving images.
#[must_use]
pub fn partition(images: &[ImageRecord]) -> (Vec<&ImageRecord>, Vec<&ImageRecord>) {
    images.iter().partition(|image| image.active)
}

/// Returns `true` when any image is still saving.
#[must_use]
pub fn has_pending(images: &[ImageRecord]) -> bool {
    images.iter().any(|image| !image.active)
}

/// Returns the most recently updated active image.
#[must_use]
pub fn newest_active(images: &[ImageRecord]) -> Option<&ImageRecord> {
    images
        .iter()
        .filter(|image| image.active)
        .max_by_key(|image| image.updated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::image_at;
    use rstest::{fixture, rstest};

    const DAY: Duration = Duration::from_secs(1440 * 60);

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2015-08-08T12:00:00Z")
            .map(|ts| ts.with_timezone(&Utc))
            .expect("valid timestamp")
    }

    #[fixture]
    fn policy() -> RetentionPolicy {
        RetentionPolicy::new(DAY)
    }

    #[rstest]
    fn creates_when_no_images_exist(policy: RetentionPolicy, now: DateTime<Utc>) {
        assert!(policy.should_create(&[], now));
    }

    #[rstest]
    #[case::fresh(10, false)]
    #[case::exactly_at_cutoff(1440, false)]
    #[case::just_outside(1441, true)]
    #[case::old(2000, true)]
    fn create_decision_follows_newest_active_age(
        policy: RetentionPolicy,
        now: DateTime<Utc>,
        #[case] minutes_old: i64,
        #[case] expected: bool,
    ) {
        let images = [image_at("a", now, minutes_old, true)];
        assert_eq!(policy.should_create(&images, now), expected);
    }

    #[rstest]
    fn pending_image_blocks_creation(policy: RetentionPolicy, now: DateTime<Utc>) {
        let images = [
            image_at("old", now, 3000, true),
            image_at("saving", now, 5, false),
        ];
        assert!(!policy.should_create(&images, now));
    }

    #[rstest]
    fn stale_images_excludes_fresh_pending_and_current(
        policy: RetentionPolicy,
        now: DateTime<Utc>,
    ) {
        let images = [
            image_at("fresh", now, 10, true),
            image_at("old-1", now, 2000, true),
            image_at("old-2", now, 5000, true),
            image_at("saving", now, 4000, false),
            image_at("new", now, 3000, true),
        ];

        let ids: Vec<String> = policy
            .stale_images(&images, now, Some("new"))
            .into_iter()
            .map(|image| image.id)
            .collect();

        assert_eq!(ids, ["old-2", "old-1"]);
    }

    #[rstest]
    fn stale_images_ignore_input_order(policy: RetentionPolicy, now: DateTime<Utc>) {
        let mut images = vec![
            image_at("a", now, 2000, true),
            image_at("b", now, 100, true),
            image_at("c", now, 9000, true),
            image_at("d", now, 1500, false),
            image_at("e", now, 1441, true),
        ];
        let forward = policy.stale_images(&images, now, None);
        images.reverse();
        let reversed = policy.stale_images(&images, now, None);
        images.swap(0, 3);
        let shuffled = policy.stale_images(&images, now, None);

        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
        assert_eq!(forward.len(), 3);
    }

    #[rstest]
    fn partition_and_newest_active(now: DateTime<Utc>) {
        let images = [
            image_at("a", now, 30, true),
            image_at("b", now, 5, false),
            image_at("c", now, 10, true),
        ];

        let (active, pending) = partition(&images);
        assert_eq!(active.len(), 2);
        assert_eq!(pending.len(), 1);
        assert!(has_pending(&images));
        assert_eq!(newest_active(&images).map(|image| image.id.as_str()), Some("c"));
    }
}
