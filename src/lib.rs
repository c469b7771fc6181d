//! On-device multimodal model serving: artifact resolution, model loading,
//! serialized inference sessions and structured response parsing.

pub mod artifact;
pub mod chat;
pub mod config;
pub mod manager;
pub mod response;
pub mod runtime;
pub mod server;
pub mod session;
