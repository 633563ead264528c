//! # Evently Backend
//!
//! Calendar-event management backend with automatic overlap merging.
//!
//! This crate provides a Rust backend for managing calendar events and
//! their invitees. Events that transitively overlap in time and share
//! invitees can be consolidated into merged events in a single atomic
//! pass. The backend exposes a REST API via Axum.
//!
//! ## Features
//!
//! - **Events**: Create, fetch, and delete events with invitee lists
//! - **Users**: Create users and associate them with events (many-to-many)
//! - **Overlap Merging**: Batch pass that groups transitively overlapping
//!   events (time + shared invitees) and replaces each group with one
//!   merged event, atomically
//! - **Storage Backends**: In-memory repository for tests/development and
//!   a Postgres/Diesel repository for production
//! - **HTTP API**: RESTful endpoints for frontend integration
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Domain types shared across layers
//! - [`db`]: Repository pattern and persistence layer
//! - [`services`]: High-level business logic, including the merge engine
//! - [`http`]: Axum-based HTTP server and request handlers

pub mod api;

pub mod db;

pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
