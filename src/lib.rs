//! Advancia Pay ledger service.
//!
//! REST API over a PostgreSQL ledger kept in integer cents: user accounts,
//! transfers, admin-approved withdrawals, NOWPayments crypto top-ups and a
//! WebSocket notification stream.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
