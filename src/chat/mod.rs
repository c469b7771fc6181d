// Rendering of server replies
mod display;

// Read-eval loop and command parsing
mod chat;

// One async handler per command
mod command_handlers;

pub use chat::chat_loop;
