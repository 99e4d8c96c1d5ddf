pub mod config;
pub mod in_memory_product_repository;
