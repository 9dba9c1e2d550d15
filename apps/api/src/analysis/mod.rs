//! CV and job-offer analysis: extraction and normalization of streamed model
//! output, backend selection, and the two orchestrators that persist results
//! and publish live updates.

pub mod agent_client;
pub mod backend;
pub mod cv_analyzer;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod model;
pub mod normalizer;
pub mod offer_analyzer;
pub mod panel;
pub mod pipeline;
pub mod prompts;
pub mod records;
