mod error;
pub mod recovery;
mod remote;
mod resolver;
pub mod session;
mod supabase;

pub use error::{AuthError, RemoteError};
pub use remote::{AuthChange, AuthChangeEvent, OfflineBackend, RemoteBackend};
pub use resolver::{IdentityResolver, SessionTiers, SignIn, SignUp};
pub use supabase::SupabaseBackend;

/// Slot holding the locally persisted session, in either tier
pub const SESSION_KEY: &str = "educare_demo_session";
