//! KeyNotifier port - delivery of issued keys to their owners.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::credential::KeySecret;

/// Errors from the notification collaborator.
///
/// Delivery failure never rolls back an issued key; the provisioner logs it
/// and the admin snapshot remains the out-of-band recovery path.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The provider could not be reached.
    #[error("notification transport failed: {0}")]
    Transport(String),

    /// The provider rejected the request.
    #[error("notification rejected with status {status}")]
    Rejected { status: u16 },
}

/// Port for handing a freshly issued key to its owner.
#[async_trait]
pub trait KeyNotifier: Send + Sync {
    /// Delivers the secret to the owner identity it was issued for.
    async fn deliver(&self, recipient: &str, secret: &KeySecret) -> Result<(), NotifyError>;
}
