pub mod appeal_service;
pub mod ban_service;
pub mod device_service;
pub mod impersonation_service;
pub mod status_sync;

pub use appeal_service::AppealService;
pub use ban_service::BanService;
pub use device_service::{select_evictions, DeviceService, SessionStamp};
pub use impersonation_service::ImpersonationService;
pub use status_sync::{StatusSynchronizer, SyncReport};
