//! Image descriptors as reported by the provider.

use chrono::{DateTime, Utc};

/// Character separating an image's group prefix from its variant suffix.
pub const GROUP_DELIMITER: char = '.';

/// Block device entry of an image, optionally backed by a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockDeviceMapping {
    /// Slot the mapping occupies (for example `root` or `1`).
    pub device: String,
    /// Snapshot backing the slot. Absent for ephemeral or local volumes.
    pub snapshot_id: Option<String>,
}

impl BlockDeviceMapping {
    /// Creates a mapping backed by `snapshot_id`.
    #[must_use]
    pub fn with_snapshot(device: impl Into<String>, snapshot_id: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            snapshot_id: Some(snapshot_id.into()),
        }
    }

    /// Creates a mapping with no backing snapshot.
    #[must_use]
    pub fn ephemeral(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            snapshot_id: None,
        }
    }
}

/// Machine image owned by the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageDescriptor {
    /// Human-readable name, `<group>.<variant>`.
    pub name: String,
    /// Provider identifier used for deregistration.
    pub image_id: String,
    /// When the provider created the image.
    pub creation_date: DateTime<Utc>,
    /// Block devices in provider order.
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

impl ImageDescriptor {
    /// Creates a descriptor without block device mappings.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        image_id: impl Into<String>,
        creation_date: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            image_id: image_id.into(),
            creation_date,
            block_device_mappings: Vec::new(),
        }
    }

    /// Appends a block device mapping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: BlockDeviceMapping) -> Self {
        self.block_device_mappings.push(mapping);
        self
    }

    /// Iterates the snapshot identifiers backing this image, one per mapping
    /// that carries a snapshot. Duplicates are preserved.
    pub fn snapshot_ids(&self) -> impl Iterator<Item = &str> {
        self.block_device_mappings
            .iter()
            .filter_map(|mapping| mapping.snapshot_id.as_deref())
    }
}
