pub mod cache;
pub mod db;
pub mod players;
pub mod server;
pub mod types;
