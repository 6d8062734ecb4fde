//! Kiln Lowering Backend
//!
//! Lowers type-checked classes of the Kiln class model into an IR that maps
//! almost one-to-one onto the managed-runtime class-file format:
//! - **IR**: classes, fields, methods, statements and expressions (`ir` module)
//! - **Lowering**: descriptor resolution, scopes, member synthesis, bridge
//!   methods and class assembly (`lower` module)
//! - **Driver**: single-class and concurrent batch entry points (`driver` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_lower::{lower_class, LowerOptions, PrettyPrint};
//! use kiln_model::ModelBuilder;
//!
//! let mut builder = ModelBuilder::new();
//! let point = builder.class("demo.Point").unwrap();
//! let model = builder.finish().unwrap();
//!
//! let lowered = lower_class(&model, point, &LowerOptions::default()).unwrap();
//! println!("{}", lowered.class.pretty_print());
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod ir;
pub mod lower;

pub use config::{ConfigError, LowerOptions, RuntimeNames};
pub use driver::{lower_class, lower_classes, lower_interface_methods_class};
pub use error::{DiagnosticKind, LowerDiagnostic, LowerError, LowerResult};
pub use ir::{IrClass, IrField, IrMethod, PrettyPrint};
pub use lower::{ClassLowerer, LoweredClass};
