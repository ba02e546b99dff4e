//! CRM Duplicate Resolution & Record Consolidation API Library
//!
//! This library resolves duplicate person (Contact) and organization
//! (Account) records in a remote CRM record store and consolidates them
//! without losing information: completeness scoring, multi-tier duplicate
//! discovery, winner/loser selection, field-level merge with consent
//! propagation, relationship transfer and cascading cleanup.
//!
//! # Modules
//!
//! - `circuit_breaker`: Circuit breaker guarding record-store calls.
//! - `config`: Configuration management.
//! - `consolidation`: Account consolidation check after a Contact merge.
//! - `discovery`: Candidate discovery (match-criteria tiers, dual search paths).
//! - `errors`: Error handling types.
//! - `field_transfer`: Field-level merge plans and consent propagation.
//! - `handlers`: HTTP request handlers.
//! - `merge`: Merge resolver (winner/loser selection).
//! - `models`: Core data models.
//! - `normalize`: Phone/email normalization and criteria escaping.
//! - `relationships`: Cross-module relationship transfer.
//! - `resolution`: The end-to-end resolution workflow.
//! - `scoring`: Completeness/engagement scoring engine.
//! - `token`: OAuth credential provider for the record store.
//! - `zoho_client`: CRM record store client.

pub mod circuit_breaker;
pub mod config;
pub mod consolidation;
pub mod discovery;
pub mod errors;
pub mod field_transfer;
pub mod handlers;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod relationships;
pub mod resolution;
pub mod scoring;
pub mod token;
pub mod zoho_client;
