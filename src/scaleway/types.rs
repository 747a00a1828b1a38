//! JSON shapes emitted by `scw instance image list -o json`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::image::{BlockDeviceMapping, ImageDescriptor};

/// Slot name given to the root volume mapping.
pub(super) const ROOT_SLOT: &str = "root";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct ScwImage {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) creation_date: DateTime<Utc>,
    #[serde(default)]
    pub(super) root_volume: Option<ScwVolumeRef>,
    #[serde(default)]
    pub(super) extra_volumes: Option<BTreeMap<String, ScwVolumeRef>>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct ScwVolumeRef {
    #[serde(default)]
    pub(super) id: Option<String>,
}

impl ScwImage {
    /// Converts the CLI representation into a descriptor. The root volume
    /// comes first, extra volumes follow in numeric slot order.
    pub(super) fn into_descriptor(self) -> ImageDescriptor {
        let mut extra: Vec<(String, ScwVolumeRef)> =
            self.extra_volumes.unwrap_or_default().into_iter().collect();
        extra.sort_by(|(lhs, _), (rhs, _)| {
            lhs.parse::<u32>()
                .ok()
                .cmp(&rhs.parse::<u32>().ok())
                .then_with(|| lhs.cmp(rhs))
        });

        let root = self
            .root_volume
            .map(|volume| (String::from(ROOT_SLOT), volume));
        let block_device_mappings = root
            .into_iter()
            .chain(extra)
            .map(|(device, volume)| BlockDeviceMapping {
                device,
                snapshot_id: volume.id.filter(|id| !id.trim().is_empty()),
            })
            .collect();

        ImageDescriptor {
            name: self.name,
            image_id: self.id,
            creation_date: self.creation_date,
            block_device_mappings,
        }
    }
}
