//! Selection of deletion candidates under a [`RetentionPolicy`].
//!
//! Images are grouped by the part of their name before the first
//! [`GROUP_DELIMITER`]. Inside each group the most recent `retain_count`
//! images are protected unconditionally; the remaining, older images are
//! selected when they are no newer than the policy cutoff.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::image::{GROUP_DELIMITER, ImageDescriptor};
use crate::policy::{PolicyError, RetentionPolicy};

/// Errors that reject a whole selection before any image is chosen.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SelectError {
    /// Raised when an image name has no group delimiter.
    #[error("image {image_id} name '{name}' has no '.' separating its group")]
    MissingDelimiter {
        /// Name reported by the provider.
        name: String,
        /// Provider identifier of the offending image.
        image_id: String,
    },
    /// Raised when the cutoff cannot be computed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Returns the group prefix of an image name.
///
/// # Errors
///
/// Returns [`SelectError::MissingDelimiter`] when the name contains no
/// [`GROUP_DELIMITER`].
pub fn group_prefix(image: &ImageDescriptor) -> Result<&str, SelectError> {
    image
        .name
        .split_once(GROUP_DELIMITER)
        .map(|(prefix, _)| prefix)
        .ok_or_else(|| SelectError::MissingDelimiter {
            name: image.name.clone(),
            image_id: image.image_id.clone(),
        })
}

/// Orders images oldest first; ties fall back to image id, then name.
pub fn sort_by_creation(images: &mut [&ImageDescriptor]) {
    images.sort_by(|lhs, rhs| {
        lhs.creation_date
            .cmp(&rhs.creation_date)
            .then_with(|| lhs.image_id.cmp(&rhs.image_id))
            .then_with(|| lhs.name.cmp(&rhs.name))
    });
}

/// Partitions images by group prefix, each group sorted oldest first.
///
/// Every input image lands in exactly one group.
///
/// # Errors
///
/// Returns [`SelectError::MissingDelimiter`] for the first image whose name
/// has no group prefix; no partial grouping is returned.
pub fn group_images(
    images: &[ImageDescriptor],
) -> Result<BTreeMap<&str, Vec<&ImageDescriptor>>, SelectError> {
    let mut sorted: Vec<&ImageDescriptor> = images.iter().collect();
    sort_by_creation(&mut sorted);

    let mut groups: BTreeMap<&str, Vec<&ImageDescriptor>> = BTreeMap::new();
    for image in sorted {
        groups.entry(group_prefix(image)?).or_default().push(image);
    }
    Ok(groups)
}

/// Selects the images to delete at instant `now`.
///
/// Survivors of each group are returned oldest first; groups follow each
/// other in prefix order, which callers must not rely on.
///
/// # Errors
///
/// Returns [`SelectError::MissingDelimiter`] when any name is malformed and
/// [`SelectError::Policy`] when the cutoff is out of range. Either way no
/// image is selected.
pub fn select(
    images: &[ImageDescriptor],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<ImageDescriptor>, SelectError> {
    let cutoff = policy.cutoff(now)?;
    let groups = group_images(images)?;

    let mut selected = Vec::new();
    for (prefix, members) in groups {
        let eligible = members.len().saturating_sub(policy.retain_count);
        let candidates = members.into_iter().take(eligible);
        let before = selected.len();
        selected.extend(
            candidates
                .filter(|image| image.creation_date <= cutoff)
                .cloned(),
        );
        tracing::debug!(
            group = prefix,
            selected = selected.len() - before,
            "applied retention policy to group"
        );
    }
    Ok(selected)
}
