//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **cache**: Redis-backed expiring store for codes and refresh tokens
//! - **mail**: logging and SMTP mail senders
//! - **memory**: in-process adapters for local runs and tests
//! - **security**: Argon2, JWT and AES-GCM primitives
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod cache;
pub mod mail;
pub mod memory;
pub mod persistence;
pub mod security;
