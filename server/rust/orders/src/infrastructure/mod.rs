pub mod config;
pub mod static_order_repository;
