pub mod auth;
pub mod cloud_storage;
pub mod context;
pub mod deep_link;
pub mod picker;
pub mod sdk;
pub mod session;
pub mod wait;

pub use auth::TokenLifecycle;
pub use cloud_storage::{DriveError, GoogleDriveFiles, Lookup};
pub use context::DriveSession;
pub use deep_link::{DeepLinkAction, DeepLinkHandler, DeepLinkOutcome, InboundMessage};
pub use picker::{FilePicker, PickerError};
pub use sdk::{SdkBundle, SdkLoader};
pub use session::{FileDescriptor, SessionState};
