//! Wire models shared by the SafeStrip client and the development backend.

pub mod models;
