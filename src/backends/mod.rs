// Network backends for the sync engine
// REST gateway (reqwest) and real-time push channel (tokio-tungstenite)

pub mod http;
pub mod messages;
pub mod socket;

pub use http::HttpGateway;
pub use messages::{ClientMessage, Register, ServerMessage, msg_types};
pub use socket::{PushChannelClient, PushEvent};
