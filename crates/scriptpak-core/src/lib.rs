// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Script container codec and entity-graph tooling.
//!
//! A container ([`Commands`]) holds composites: named, reusable graphs of
//! entities. Entities are functions (instances of a built-in type or of
//! another composite), variables, proxies and aliases. Entities carry links
//! and typed parameters; resources are attached to entities or to their
//! RESOURCE parameters.
//!
//! The crate provides:
//! - a byte-exact reader and writer for the container format ([`pak`]),
//! - the reconciliation of a composite's flat resource pool with its
//!   entities ([`reconcile`]),
//! - path resolution through nested composite instances ([`resolve`]),
//! - default parameter materialisation from function-type metadata
//!   ([`defaults`]).
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::module_name_repetitions
)]

pub mod builtin;
pub mod commands;
pub mod composite;
pub mod config;
pub mod defaults;
pub mod entity;
pub mod functions;
pub mod pak;
pub mod param;
pub mod reconcile;
pub mod report;
pub mod resolve;
pub mod resource;

pub use commands::{Commands, EntryPoint};
pub use composite::Composite;
pub use config::{CodecConfig, ConfigError, ResourceWarnings};
pub use defaults::{apply_defaults, DefaultEngine, DefaultOptions, InvariantViolation};
pub use entity::{Entity, EntityKind, EntityPath, FunctionData, FunctionEntity, Link};
pub use functions::{
    FunctionTypeTable, FunctionTypeTableBuilder, ParameterDescriptor, ParameterVariant,
    ParameterVariants, TableError,
};
pub use pak::{ParseError, SaveError};
pub use param::{
    DataType, EnumValue, Parameter, ParameterValue, ResourceParameter, Transform, Vec3,
};
pub use report::{Report, Warning};
pub use resolve::{Resolved, Resolver};
pub use resource::{ResourceData, ResourceKind, ResourceReference};
pub use scriptpak_ident::{hash_text, Dictionary, IdentError, Identifier, Interner};
