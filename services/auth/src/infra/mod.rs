pub mod cache;
pub mod db;
pub mod microsoft;
pub mod state_store;
