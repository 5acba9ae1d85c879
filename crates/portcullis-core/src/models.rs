//! Domain models for Portcullis.
//!
//! Everything a tenant owns lives by value inside its [`Organization`]
//! aggregate; the other modules define the embedded entities.
//!
//! [`Organization`]: organization::Organization

pub mod api_key;
pub mod attribute;
pub mod group;
pub mod organization;
pub mod policy;
pub mod resource;
pub mod role;
pub mod user;
