pub mod compute_service;
pub mod lifecycle_service;
pub mod network_service;
pub mod report_service;
pub mod resolver_service;
pub mod snapshot_service;
pub mod storage_service;
pub mod tag_service;
