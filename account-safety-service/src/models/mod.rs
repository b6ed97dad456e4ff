pub mod appeal;
pub mod ban;
pub mod device;
pub mod impersonation;
pub mod recovery;
pub mod user;

pub use appeal::*;
pub use ban::*;
pub use device::*;
pub use impersonation::*;
pub use recovery::*;
pub use user::*;
