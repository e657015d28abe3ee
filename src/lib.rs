//! Terminal client for a simulated-patient chat service.
//!
//! A signed-in clinician interviews a generated patient. Each patient case is
//! one conversation identity kept in a configurable storage tier; replies come
//! from `POST /chat` and past cases from `GET /sessions/{user_id}`.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod conversation;
pub mod error;
pub mod history;
pub mod identity;
pub mod speech;
pub mod storage;
pub mod tui;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;
