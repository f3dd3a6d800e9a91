//! Profile management for the logged-in user.
//!
//! Name and photo changes return a refreshed credential; it is stored
//! through [`Session::set_credential`] so the displayed identity updates
//! with it.

use std::sync::Arc;

use tracing::instrument;

use tienda_core::IdentityClaims;

use crate::api::{Backend, ChangePasswordRequest, PhotoUpload, UpdateNameRequest};
use crate::error::{self, ApiError, Result, StoreError};
use crate::session::Session;

/// Minimum length of a new password.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Profile operations.
pub struct Profile {
    backend: Arc<dyn Backend>,
    session: Arc<Session>,
}

impl Profile {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, session: Arc<Session>) -> Self {
        Self { backend, session }
    }

    /// Change the display name.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out or when the name is blank.
    #[instrument(skip(self))]
    pub async fn update_name(&self, name: &str) -> Result<IdentityClaims> {
        self.require_session()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::invalid("Name is required."));
        }

        error::add_breadcrumb("profile", "Updated name", None);
        let response = self
            .backend
            .update_name(&UpdateNameRequest {
                name: name.to_string(),
            })
            .await?;
        self.refresh(&response.token)
    }

    /// Change the password. Returns the backend's confirmation text.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out, when the current password is empty
    /// or when the new one is shorter than [`MIN_PASSWORD_LEN`].
    #[instrument(skip_all)]
    pub async fn change_password(&self, current: &str, new: &str) -> Result<String> {
        self.require_session()?;
        if current.is_empty() {
            return Err(StoreError::invalid("Current password is required."));
        }
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Err(StoreError::invalid(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }

        error::add_breadcrumb("profile", "Changed password", None);
        let confirmation = self
            .backend
            .change_password(&ChangePasswordRequest {
                current: current.to_string(),
                new: new.to_string(),
            })
            .await?;
        Ok(confirmation)
    }

    /// Upload a new profile photo.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out, when the file is empty or when it
    /// is not an image.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload_photo(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<IdentityClaims> {
        self.require_session()?;
        if bytes.is_empty() {
            return Err(StoreError::invalid("The selected file is empty."));
        }
        if !mime_type.starts_with("image/") {
            return Err(StoreError::invalid("The selected file is not an image."));
        }

        error::add_breadcrumb("profile", "Uploaded photo", None);
        let response = self
            .backend
            .upload_photo(PhotoUpload {
                file_name: file_name.to_string(),
                mime_type: mime_type.to_string(),
                bytes,
            })
            .await?;
        self.refresh(&response.token)
    }

    /// Remove the profile photo.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out. Backend failures are classified.
    #[instrument(skip(self))]
    pub async fn delete_photo(&self) -> Result<IdentityClaims> {
        self.require_session()?;

        error::add_breadcrumb("profile", "Deleted photo", None);
        let response = self.backend.delete_photo().await?;
        self.refresh(&response.token)
    }

    fn require_session(&self) -> Result<()> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(StoreError::not_logged_in())
        }
    }

    /// Store a refreshed credential.
    fn refresh(&self, token: &str) -> Result<IdentityClaims> {
        self.session
            .set_credential(token)?
            .ok_or_else(|| ApiError::MalformedCredential.into())
    }
}

/// Up to two uppercase letters for an avatar placeholder.
///
/// ```
/// use tienda_storefront::profile::initials;
///
/// assert_eq!(initials("Ana María López"), "AL");
/// assert_eq!(initials("ana"), "AN");
/// assert_eq!(initials("  "), "??");
/// ```
#[must_use]
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    match words.as_slice() {
        [] => "??".to_string(),
        [word] => word.chars().take(2).collect::<String>().to_uppercase(),
        [first, .., last] => first
            .chars()
            .take(1)
            .chain(last.chars().take(1))
            .collect::<String>()
            .to_uppercase(),
    }
}
