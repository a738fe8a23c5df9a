//! Runtime type knowledge for basekit.
//!
//! Nothing in the object model is compiled in: consumers describe the types
//! they understand at runtime and register them here. This crate provides:
//! - [`TypeDescriptor`] / [`PropertySpec`] / [`Shape`]: what a type's
//!   declared properties look like and which ones detach or chunk
//! - [`TypeRegistry`]: chain resolution with ancestry fallback, memoized
//! - [`AbstractTypeRegistry`]: paired decode/encode closures for opaque
//!   host values keyed by qualified name
//!
//! Resolution never fails. A chain nobody registered resolves to the
//! generic descriptor, and the decoder records the miss as an issue on the
//! decoded object instead of erroring.

pub mod abstracts;
pub mod descriptor;
pub mod registry;
pub mod shape;

pub use abstracts::{AbstractCodec, AbstractTypeRegistry};
pub use descriptor::{PropertySpec, TypeDescriptor};
pub use registry::{TypeRegistry, TypeResolution};
pub use shape::Shape;
