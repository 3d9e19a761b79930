pub mod database_service;
pub mod repository;
