//! Shared fixtures for wdome-ie integration tests

pub mod failure_injection;

pub use failure_injection::ZoneFailureRepository;
