//! Client and wire types for the Open Delivery Gear (ODG) API.
//!
//! The [`DeliveryService`] trait is the seam used by the reconciler; the
//! [`OdgClient`] implements it over HTTP.

pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{Authentication, OdgClient, OdgClientBuilder};
pub use error::{ApiError, Result};
pub use traits::{DeliveryService, DynDeliveryService};
pub use types::*;
