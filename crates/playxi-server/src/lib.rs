pub mod app;
pub mod ws_server;
