pub mod appeals;
pub mod bans;
pub mod devices;
pub mod impersonation;
pub mod recovery_codes;
pub mod users;

pub use appeals::AppealsDb;
pub use bans::BansDb;
pub use devices::DevicesDb;
pub use impersonation::ImpersonationDb;
pub use recovery_codes::RecoveryCodesDb;
pub use users::UsersDb;
