pub mod server;

pub use server::AccountSafetyServiceImpl;
