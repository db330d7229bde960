//! Boolean solid operations (*union*, *subtract*, *trim*, *intersect*) on
//! boundary-represented solids made of planar polygonal faces.
//!
//! Solids are thin-walled polygon shells bounding a closed volume: a
//! [`Container`] instances a shared [`Definition`] (a welded vertex pool,
//! an edge table and a face list, plus nested child containers) through a
//! rigid transform. A container is *solid* when every edge of its own
//! geometry binds an even number of faces; nested children are opaque to
//! every query and operation here.
//!
//! The four operators preserve the primary operand's identity, material
//! and layer attributes, and nested geometry; the secondary operand is
//! always consumed through a private isolation copy so other instances of
//! its definition are never mutated. Operations return `None` when an
//! operand is not solid (nothing is mutated), `Some(true)` on a clean
//! result and `Some(false)` when the committed result fails the final
//! manifold test.
//!
//! ```
//! use solidops::{Model, shapes};
//! use nalgebra::{Point3, Translation3, Vector3};
//!
//! let mut model = Model::new();
//! let d1 = shapes::cube(&mut model, 1.0);
//! let d2 = shapes::cube(&mut model, 1.0);
//! let a = model.instance("a", d1);
//! let b = model.instance("b", d2);
//! model.container_mut(b).unwrap().transform =
//!     Translation3::from(Vector3::new(0.5, 0.5, 0.0)).to_homogeneous();
//!
//! assert_eq!(model.union(a, b), Some(true));
//! assert_eq!(model.within(&Point3::new(1.25, 1.25, 0.5), a, true, true), Some(true));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod boolean;
pub mod errors;
pub mod float_types;
pub mod intersect;
pub mod model;
pub mod shapes;
pub mod shell;

pub use boolean::BooleanOp;
pub use model::{Container, ContainerId, Definition, DefinitionId, Model};
pub use shell::{Attributes, Shell};

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");
