//! # Admit Server
//!
//! Hosts the tiered cache and the realtime event router behind one HTTP
//! listener. Components are built once in [`startup`] and handed to request
//! handlers through [`AppContext`].

pub mod app;
pub mod context;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod startup;

pub use app::create_router;
pub use context::AppContext;
