pub mod callbacks;
pub mod registry;
pub mod server;
