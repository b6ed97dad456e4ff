pub mod config;
pub mod db;
pub mod error;
pub mod grpc;
pub mod models;
pub mod security;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SafetyError};
pub use models::{
    AppealStatus, BanAppeal, CreateBanInput, ImpersonationEndReason, RecordLoginInput,
    SubmitAppealInput, TrustedDevice, UserBan, UserDevice, UserStatus,
};
pub use services::{
    AppealService, BanService, DeviceService, ImpersonationService, StatusSynchronizer, SyncReport,
};
