pub mod callback_context;
pub mod capture_engine;
pub mod capture_session;
pub mod channel_observer;
pub mod permission_gateway;
