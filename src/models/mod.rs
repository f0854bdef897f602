pub mod assignment;
pub mod chat;
pub mod order;
pub mod user;
