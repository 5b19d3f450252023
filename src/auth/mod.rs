// Authentication module
// Manages the client-credentials token lifecycle and its background refresh

mod clock;
mod credentials;
mod manager;
mod refresh;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::Credentials;
pub use manager::TokenManager;
pub use refresh::{RefreshHandle, RefreshPolicy, RefreshStatus};
pub use types::{TokenResponse, TokenState};
