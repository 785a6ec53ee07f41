mod handler;
mod message;

pub use handler::{handle_socket, process_message, ws_handler};
pub use message::{ClientMessage, MessageError, OutboundMessage};
