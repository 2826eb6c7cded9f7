//! Data models shared by the relay server and the dashboard client.
//!
//! Wire names follow what the browser dashboard expects: storage objects use
//! the S3 `Key`/`Size` casing, everything else is camelCase JSON.

pub mod message;
pub mod notification;
pub mod object;
pub mod relay;
pub mod user;
