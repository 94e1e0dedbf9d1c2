pub mod middleware;
pub mod models;

pub use middleware::{auth_middleware, create_token, AuthState};
pub use models::{JwtClaims, UserContext, UserRole};
