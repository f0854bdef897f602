pub mod acceptance;
pub mod dispatch;
pub mod handshake;
