// Profiles: the signed-in user's own display fields.

pub mod handlers;
pub mod service;
