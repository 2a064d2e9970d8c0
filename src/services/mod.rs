pub mod display_service;
pub mod display_watcher;
pub mod order_service;
pub mod sweep_service;
