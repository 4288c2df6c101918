// Valuation: market comparable → price estimate → stored markdown report.
// All LLM calls go through llm_client; the estimator receives the client explicitly.

pub mod estimator;
pub mod handlers;
pub mod prompts;
pub mod report;
