// Authentication module
// Manages the session lifecycle: storage, login/logout and token refresh

mod credentials;
mod manager;
mod refresh;
mod storage;
mod types;

pub use credentials::CredentialStore;
pub use manager::SessionManager;
pub use refresh::{RefreshCoordinator, ReplayTurn};
pub use storage::{
    FileStorage, MemoryStorage, SessionStorage, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY,
};
pub use types::{AuthPayload, LoginCredentials, RefreshRequest, Session, LOGIN_PATH, REFRESH_PATH};
