//! Conversation persistence port and the service that drives the pipeline.

pub mod repository;
pub mod service;

pub use repository::ConversationRepository;
pub use service::ConversationService;
