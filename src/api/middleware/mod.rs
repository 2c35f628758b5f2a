//! Middleware for the API router.

pub mod audit;
