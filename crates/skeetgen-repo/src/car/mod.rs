//! CAR (Content Addressable aRchive) I/O
//!
//! Repository exports are CAR v1 streams with exactly one root, the commit.
//!
//! # Examples
//!
//! ```ignore
//! use skeetgen_repo::car::parse_car_bytes;
//!
//! let parsed = parse_car_bytes(&car_bytes, &CancellationToken::new()).await?;
//! let (root, store) = parsed.into_store(VerifyPolicy::Trust);
//! ```

pub mod reader;
pub mod writer;

pub use reader::{ParsedCar, parse_car_bytes};
pub use writer::write_car_bytes;
