pub mod directory;
pub mod normalizer;
pub mod object_store;
pub mod queue;
pub mod user_store;
pub mod validation;
