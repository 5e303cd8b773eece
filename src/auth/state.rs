//! Authentication state trait.

use crate::service::AuthService;
use crate::store::Backend;

/// Trait for state types that carry an [`AuthService`].
pub trait HasAuthService {
    type Backend: Backend;

    fn auth(&self) -> &AuthService<Self::Backend>;
}
