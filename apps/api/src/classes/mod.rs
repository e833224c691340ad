// Classes: creation, listing, ownership-gated deletion and the per-class
// custom instruction text forwarded to the AI service.

pub mod handlers;
pub mod service;
