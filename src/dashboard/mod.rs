//! Client-side dashboard state and the relay client that feeds it.

pub mod client;
pub mod feed;
pub mod listing;
pub mod upload;
