pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers so the binary can build the router from them.
pub use rest::create_account_handler;
pub use ws_handler::ws_handler;
