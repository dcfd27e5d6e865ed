mod auth;
mod device;
mod sensor;
mod workspace;

pub use auth::*;
pub use device::*;
pub use sensor::*;
pub use workspace::*;

pub type Id = uuid::Uuid;
