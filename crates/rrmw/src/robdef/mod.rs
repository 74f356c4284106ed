// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Service definition language: parsing, regeneration, and verification.
//!
//! `.robdef` documents describe the types and objects a service exposes.
//! [`ast::ServiceDefinition::from_string`] parses one document;
//! [`verify::verify_service_definitions`] checks a complete set of
//! interdependent documents and resolves named types across imports.

pub mod ast;
mod parser;
pub mod types;
pub mod verify;

pub use ast::{
    compare_service_definitions, compare_service_entries, ConstantDefinition, EnumDefinition,
    MemberDefinition, ServiceDefinition, ServiceEntryDefinition, StdVer, UsingDefinition,
};
pub use types::{ArrayShape, ContainerKind, DataType, NamedTypeKind, TypeDefinition};
pub use verify::verify_service_definitions;
