//! Capabilities the cleaner needs from a cloud provider.

use thiserror::Error;

use crate::command::CommandError;
use crate::image::ImageDescriptor;

/// Errors raised by provider calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// Raised when the provider CLI cannot be executed.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// Raised when the provider CLI exits with a non-zero status.
    #[error("{program} exited with status {status_text} during {action}: {stderr}")]
    CommandFailure {
        /// Program that failed (typically `scw`).
        program: String,
        /// Operation being attempted, for example `image delete`.
        action: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when provider output cannot be parsed.
    #[error("failed to parse {resource} output: {message}")]
    Parse {
        /// Resource type being parsed (for example `images`).
        resource: String,
        /// Parser error message.
        message: String,
    },
    /// Raised by providers that reject a request outright.
    #[error("provider rejected {action} of {resource_id}: {message}")]
    Rejected {
        /// Operation being attempted.
        action: String,
        /// Image or snapshot identifier.
        resource_id: String,
        /// Provider supplied reason.
        message: String,
    },
    /// Raised when a provider call panicked instead of returning.
    #[error("provider panicked during {action} of {resource_id}: {message}")]
    Panicked {
        /// Operation being attempted.
        action: String,
        /// Image or snapshot identifier.
        resource_id: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// Image inventory and deletion operations offered by a cloud provider.
///
/// Implementations are shared by every deletion worker, so each call must be
/// safe to issue concurrently from several threads.
pub trait ImageProvider: Send + Sync {
    /// Lists every image owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the inventory cannot be fetched.
    fn list_owned_images(&self) -> Result<Vec<ImageDescriptor>, ProviderError>;

    /// Deregisters an image, leaving its snapshots in place.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider refuses or the call fails.
    fn deregister_image(&self, image_id: &str) -> Result<(), ProviderError>;

    /// Deletes a storage snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider refuses or the call fails.
    fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), ProviderError>;
}

