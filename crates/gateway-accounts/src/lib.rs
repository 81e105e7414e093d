//! # Gateway Accounts
//!
//! Identity resolvers and quota ledgers behind the core collaborator traits:
//!
//! - [`SupabaseIdentityResolver`] / [`SupabaseQuotaLedger`]: Supabase auth and REST APIs
//! - [`JwtIdentityResolver`]: local HS256 verification with the project JWT secret
//! - [`StaticIdentityResolver`] / [`InMemoryQuotaLedger`]: development and tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod factory;
pub mod jwt;
pub mod memory;
pub mod supabase;

pub use factory::{identity_resolver, quota_ledger};
pub use jwt::JwtIdentityResolver;
pub use memory::{InMemoryQuotaLedger, StaticIdentityResolver};
pub use supabase::{SupabaseClientConfig, SupabaseIdentityResolver, SupabaseQuotaLedger};
