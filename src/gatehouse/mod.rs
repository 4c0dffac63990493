//! Session/profile coordination.
//!
//! The identity provider and the profile store are external collaborators
//! reached through the [`IdentityProvider`] and [`ProfileStore`] traits. The
//! [`Coordinator`] is the single owner of "who is signed in and what we know
//! about them"; view models in [`views`] only hold form state.
//!
//! Flow Overview: a view calls a coordinator operation, the coordinator calls
//! the provider, and the provider's session-change notification drives the
//! profile read, the merged publication and the last-login write.

pub mod coordinator;
pub mod error;
pub mod identity;
pub mod memory;
pub mod profile;
pub mod session;
pub mod store;
pub mod validation;
pub mod views;

pub use coordinator::{AuthSnapshot, Coordinator};
pub use error::{AuthError, IdentityError, StoreError};
pub use identity::{
    FederatedProvider, FederatedSignIn, IdentityProvider, ProviderError, ProviderErrorCode,
    SessionChanges, SessionNotifier,
};
pub use profile::{Profile, ProfilePatch, DEFAULT_ROLE, PROFILE_COLLECTION};
pub use session::{Session, SessionMetadata};
pub use store::ProfileStore;
