pub mod cache;
pub mod pricing_repository;
