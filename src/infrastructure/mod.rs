pub mod database;
pub mod error;
pub mod jwt;
pub mod storage;
