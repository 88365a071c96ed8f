pub mod generation;
pub mod recent;
pub mod table_service;
