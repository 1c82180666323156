//! # Property Graph Model
//!
//! Plain DTOs for the property graph: vertices, edges and property values.
//! These types cross every boundary: store ↔ schema layer ↔ queries ↔ user.
//!
//! This module is pure data with no I/O and no state.

pub mod vertex;
pub mod edge;
pub mod value;
pub mod property_map;

pub use vertex::{Vertex, VertexId};
pub use edge::{Edge, Direction};
pub use value::Value;
pub use property_map::{PropertyMap, props, RESERVED_KEYS};
