//! Daily summaries: one reflection record per calendar day.

pub mod repository;
pub mod service;

pub use repository::SummaryRepository;
pub use service::SummaryService;
