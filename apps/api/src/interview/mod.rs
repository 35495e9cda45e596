// Interview coaching workflow.
// Implements: prompt rendering, response parsing, STAR hints, the session stage machine,
// the in-memory session store and its HTTP handlers.
// All model calls go through llm_client; no direct Gemini calls here.

pub mod handlers;
pub mod parser;
pub mod prompts;
pub mod session;
pub mod star;
pub mod store;
