// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Verification of parsed service definitions.
//!
//! Verification runs over a complete set of interdependent definitions.
//! Within one definition the first failure aborts its verification; the
//! driver still visits the remaining sibling definitions and reports the
//! first error found. Non-fatal advisories (deprecated syntax, unknown
//! modifiers) are collected as warnings and never fail the batch.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::robdef::ast::{
    ConstantDefinition, EntryKind, MemberDefinition, ServiceDefinition, ServiceEntryDefinition,
    StdVer,
};
use crate::robdef::types::{
    ArrayShape, ContainerKind, DataType, NamedTypeKind, ResolvedNamedType, TypeDefinition,
};

/// Keywords of the definition grammar plus primitive type names. None of
/// these may be used as a declared name.
const RESERVED_WORDS: &[&str] = &[
    "service",
    "stdver",
    "option",
    "import",
    "using",
    "exception",
    "constant",
    "enum",
    "struct",
    "pod",
    "namedarray",
    "object",
    "end",
    "implements",
    "field",
    "property",
    "function",
    "event",
    "objref",
    "pipe",
    "callback",
    "wire",
    "memory",
    "void",
    "double",
    "single",
    "int8",
    "uint8",
    "int16",
    "uint16",
    "int32",
    "uint32",
    "int64",
    "uint64",
    "string",
    "cdouble",
    "csingle",
    "bool",
    "varvalue",
    "varobject",
];

/// Member modifiers understood by this implementation. Anything else is
/// reported as a warning.
const KNOWN_MODIFIERS: &[&str] = &[
    "readonly",
    "writeonly",
    "unreliable",
    "perclient",
    "urgent",
    "nolock",
    "nolockread",
];

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z](?:\w*[a-zA-Z0-9])?$")
            .unwrap_or_else(|e| panic!("identifier regex: {}", e))
    })
}

fn verify_err(message: String) -> Error {
    Error::ServiceDefinition(message)
}

/// Verify a set of interdependent service definitions.
///
/// Returns collected warnings on success. Every imported definition must be
/// present in `defs`.
///
/// # Errors
///
/// Returns [`Error::ServiceDefinition`] describing the first failure.
pub fn verify_service_definitions(defs: &[ServiceDefinition]) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    let mut by_name: HashMap<&str, &ServiceDefinition> = HashMap::new();
    for def in defs {
        if by_name.insert(def.name.as_str(), def).is_some() {
            return Err(verify_err(format!(
                "duplicate service definition '{}'",
                def.name
            )));
        }
    }

    check_import_cycles(defs, &by_name)?;

    let mut first_error = None;
    for def in defs {
        if let Err(e) = verify_definition(def, &by_name, &mut warnings) {
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(warnings),
    }
}

// ============================================================================
// Import graph
// ============================================================================

fn check_import_cycles(
    defs: &[ServiceDefinition],
    by_name: &HashMap<&str, &ServiceDefinition>,
) -> Result<()> {
    const IN_PROGRESS: u8 = 1;
    const DONE: u8 = 2;

    fn visit<'a>(
        name: &'a str,
        by_name: &HashMap<&str, &'a ServiceDefinition>,
        state: &mut HashMap<&'a str, u8>,
    ) -> Result<()> {
        match state.get(name) {
            Some(&IN_PROGRESS) => {
                return Err(verify_err(format!(
                    "import cycle involving service definition '{}'",
                    name
                )));
            }
            Some(&DONE) => return Ok(()),
            _ => {}
        }
        state.insert(name, IN_PROGRESS);
        if let Some(def) = by_name.get(name) {
            for import in &def.imports {
                // Missing imports are reported during per-definition checks.
                if by_name.contains_key(import.as_str()) {
                    visit(import.as_str(), by_name, state)?;
                }
            }
        }
        state.insert(name, DONE);
        Ok(())
    }

    let mut state: HashMap<&str, u8> = HashMap::new();
    for def in defs {
        visit(def.name.as_str(), by_name, &mut state)?;
    }
    Ok(())
}

// ============================================================================
// Names
// ============================================================================

/// Check one declared name: identifier shape, reserved words, and the
/// forbidden prefixes.
fn check_declared_name(name: &str, what: &str) -> Result<()> {
    if !identifier_regex().is_match(name) {
        return Err(verify_err(format!("invalid {} name '{}'", what, name)));
    }
    if RESERVED_WORDS.contains(&name) {
        return Err(verify_err(format!(
            "{} name '{}' is a reserved word",
            what, name
        )));
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("rr")
        || lower.starts_with("robotraconteur")
        || name.starts_with("get_")
        || name.starts_with("set_")
        || name.starts_with("async_")
    {
        return Err(verify_err(format!(
            "{} name '{}' uses a forbidden prefix",
            what, name
        )));
    }
    Ok(())
}

/// Service names are dotted; each segment must be a legal identifier and not
/// a reserved word. The forbidden member prefixes do not apply here.
fn check_service_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(verify_err("service definition has no name".to_string()));
    }
    for segment in name.split('.') {
        if !identifier_regex().is_match(segment) || RESERVED_WORDS.contains(&segment) {
            return Err(verify_err(format!("invalid service name '{}'", name)));
        }
    }
    Ok(())
}

// ============================================================================
// Definition verification
// ============================================================================

fn verify_definition(
    def: &ServiceDefinition,
    by_name: &HashMap<&str, &ServiceDefinition>,
    warnings: &mut Vec<String>,
) -> Result<()> {
    check_service_name(&def.name)?;

    let version = def.declared_version();
    let ctx = TypeContext {
        def,
        by_name,
        version: version.clone(),
    };

    // An import may not declare a newer standard than its importer.
    let effective = version.unwrap_or_else(|| StdVer::new(0, 0));
    for import in &def.imports {
        let imported = by_name.get(import.as_str()).ok_or_else(|| {
            verify_err(format!(
                "service definition '{}' imports '{}' which was not supplied",
                def.name, import
            ))
        })?;
        if let Some(iv) = imported.declared_version() {
            if iv > effective {
                return Err(verify_err(format!(
                    "service definition '{}' imports '{}' which declares a newer standard version",
                    def.name, import
                )));
            }
        }
    }

    if !def.usings.is_empty() {
        ctx.require_version("using declarations")?;
    }
    if !def.enums.is_empty() {
        ctx.require_version("enums")?;
    }
    if !def.pods.is_empty() {
        ctx.require_version("pods")?;
    }
    if !def.namedarrays.is_empty() {
        ctx.require_version("namedarrays")?;
    }

    // One namespace for everything declared at the top level.
    let mut names: HashSet<&str> = HashSet::new();

    for using in &def.usings {
        check_declared_name(&using.alias, "using alias")?;
        claim_name(&mut names, &using.alias, "using alias", &def.name)?;
        ctx.check_using(using)?;
    }
    for exception in &def.exceptions {
        check_declared_name(exception, "exception")?;
        claim_name(&mut names, exception, "exception", &def.name)?;
    }
    for constant in &def.constants {
        check_declared_name(&constant.name, "constant")?;
        claim_name(&mut names, &constant.name, "constant", &def.name)?;
        ctx.verify_constant(constant, &|n| def.find_constant(n))?;
    }
    for e in &def.enums {
        check_declared_name(&e.name, "enum")?;
        claim_name(&mut names, &e.name, "enum", &def.name)?;
        let mut value_names: HashSet<&str> = HashSet::new();
        let mut values: HashSet<i64> = HashSet::new();
        for v in &e.values {
            check_declared_name(&v.name, "enum value")?;
            if !value_names.insert(v.name.as_str()) {
                return Err(verify_err(format!(
                    "duplicate enum value name '{}' in enum '{}'",
                    v.name, e.name
                )));
            }
            if !values.insert(v.value) {
                return Err(verify_err(format!(
                    "duplicate enum value {} in enum '{}'",
                    v.value, e.name
                )));
            }
        }
    }

    for entry in def
        .structures
        .iter()
        .chain(&def.pods)
        .chain(&def.namedarrays)
        .chain(&def.objects)
    {
        check_declared_name(&entry.name, entry.entry_kind.keyword())?;
        claim_name(&mut names, &entry.name, entry.entry_kind.keyword(), &def.name)?;
        ctx.verify_entry(entry, warnings)?;
    }

    // Recursion through pod and namedarray nesting.
    for entry in def.pods.iter().chain(&def.namedarrays) {
        ctx.check_value_recursion(def, entry, &HashSet::new())?;
    }

    for object in &def.objects {
        ctx.verify_object_implements(object)?;
    }

    Ok(())
}

fn claim_name<'a>(
    names: &mut HashSet<&'a str>,
    name: &'a str,
    what: &str,
    service: &str,
) -> Result<()> {
    if !names.insert(name) {
        return Err(verify_err(format!(
            "duplicate {} name '{}' in service definition '{}'",
            what, name, service
        )));
    }
    Ok(())
}

// ============================================================================
// Type checking context
// ============================================================================

struct TypeContext<'a> {
    def: &'a ServiceDefinition,
    by_name: &'a HashMap<&'a str, &'a ServiceDefinition>,
    version: Option<StdVer>,
}

/// Namespace kind of an exported name within one definition.
fn exported_kind(def: &ServiceDefinition, name: &str) -> Option<NamedTypeKind> {
    if def.structures.iter().any(|e| e.name == name) {
        return Some(NamedTypeKind::Structure);
    }
    if def.pods.iter().any(|e| e.name == name) {
        return Some(NamedTypeKind::Pod);
    }
    if def.namedarrays.iter().any(|e| e.name == name) {
        return Some(NamedTypeKind::NamedArray);
    }
    if def.objects.iter().any(|e| e.name == name) {
        return Some(NamedTypeKind::Object);
    }
    if def.enums.iter().any(|e| e.name == name) {
        return Some(NamedTypeKind::Enum);
    }
    if def.exceptions.iter().any(|e| e == name) {
        return Some(NamedTypeKind::Exception);
    }
    None
}

impl<'a> TypeContext<'a> {
    fn for_def(&self, def: &'a ServiceDefinition) -> TypeContext<'a> {
        TypeContext {
            def,
            by_name: self.by_name,
            version: def.declared_version(),
        }
    }

    fn require_version(&self, feature: &str) -> Result<()> {
        let satisfied = self
            .version
            .as_ref()
            .is_some_and(|v| *v >= StdVer::new(0, 9));
        if satisfied {
            Ok(())
        } else {
            Err(verify_err(format!(
                "{} require stdver 0.9 in service definition '{}'",
                feature, self.def.name
            )))
        }
    }

    fn check_using(&self, using: &crate::robdef::ast::UsingDefinition) -> Result<()> {
        let (service, type_name) = using.qualified.rsplit_once('.').ok_or_else(|| {
            verify_err(format!(
                "using declaration '{}' is not qualified with a service name",
                using.qualified
            ))
        })?;
        let target = self.imported_def(service, &using.qualified)?;
        if exported_kind(target, type_name).is_none() {
            return Err(verify_err(format!(
                "using declaration '{}' does not name a type in '{}'",
                using.qualified, service
            )));
        }
        Ok(())
    }

    fn imported_def(&self, service: &str, reference: &str) -> Result<&'a ServiceDefinition> {
        if service == self.def.name {
            return Ok(self.def);
        }
        if !self.def.imports.iter().any(|i| i == service) {
            return Err(verify_err(format!(
                "'{}' refers to service definition '{}' which is not imported by '{}'",
                reference, service, self.def.name
            )));
        }
        self.by_name.get(service).copied().ok_or_else(|| {
            verify_err(format!(
                "service definition '{}' imported by '{}' was not supplied",
                service, self.def.name
            ))
        })
    }

    /// Resolve a named type against the local definition, using aliases, and
    /// qualified imports.
    fn resolve(&self, name: &str) -> Result<ResolvedNamedType> {
        if let Some((service, type_name)) = name.rsplit_once('.') {
            let target = self.imported_def(service, name)?;
            let kind = exported_kind(target, type_name).ok_or_else(|| {
                verify_err(format!("type '{}' not found", name))
            })?;
            return Ok(ResolvedNamedType {
                kind,
                service: target.name.clone(),
                name: type_name.to_string(),
            });
        }
        if let Some(kind) = exported_kind(self.def, name) {
            return Ok(ResolvedNamedType {
                kind,
                service: self.def.name.clone(),
                name: name.to_string(),
            });
        }
        for using in &self.def.usings {
            if using.alias == name {
                let (service, type_name) =
                    using.qualified.rsplit_once('.').ok_or_else(|| {
                        verify_err(format!(
                            "using declaration '{}' is not qualified with a service name",
                            using.qualified
                        ))
                    })?;
                let target = self.imported_def(service, &using.qualified)?;
                let kind = exported_kind(target, type_name).ok_or_else(|| {
                    verify_err(format!("type '{}' not found", using.qualified))
                })?;
                return Ok(ResolvedNamedType {
                    kind,
                    service: target.name.clone(),
                    name: type_name.to_string(),
                });
            }
        }
        Err(verify_err(format!(
            "type '{}' not found in service definition '{}'",
            name, self.def.name
        )))
    }

    fn resolve_type(&self, td: &TypeDefinition, name: &str) -> Result<ResolvedNamedType> {
        if let Some(cached) = td.cached_resolution() {
            return Ok(cached.clone());
        }
        let resolved = self.resolve(name)?;
        td.cache_resolution(resolved.clone());
        Ok(resolved)
    }

    // ===== Type rules =====

    /// Rules shared by every value-carrying declaration: properties, struct
    /// fields, function parameters and returns, events, pipes, and wires.
    fn verify_value_type(&self, td: &TypeDefinition, place: &str) -> Result<()> {
        match &td.data_type {
            DataType::CDouble | DataType::CSingle => {
                self.require_version("complex types")?;
            }
            DataType::Bool => self.require_version("bool types")?,
            _ => {}
        }
        match &td.data_type {
            DataType::Void => Err(verify_err(format!(
                "void is not a valid data type for {}",
                place
            ))),
            DataType::VarObject => Err(verify_err(format!(
                "varobject is only valid for objref members, not {}",
                place
            ))),
            DataType::String if td.array.is_array() => Err(verify_err(format!(
                "string cannot have an array shape in {}",
                place
            ))),
            DataType::VarValue if td.array.is_array() => Err(verify_err(format!(
                "varvalue cannot have an array shape in {}",
                place
            ))),
            DataType::Named(n) => {
                let resolved = self.resolve_type(td, n)?;
                match resolved.kind {
                    NamedTypeKind::Structure | NamedTypeKind::Enum if td.array.is_array() => {
                        Err(verify_err(format!(
                            "type '{}' cannot have an array shape in {}",
                            n, place
                        )))
                    }
                    NamedTypeKind::Structure
                    | NamedTypeKind::Pod
                    | NamedTypeKind::NamedArray
                    | NamedTypeKind::Enum => Ok(()),
                    NamedTypeKind::Object | NamedTypeKind::Exception => Err(verify_err(format!(
                        "type '{}' cannot be used as a value in {}",
                        n, place
                    ))),
                }
            }
            _ => Ok(()),
        }
    }

    /// Value type that may carry a list or map container but never a
    /// generator.
    fn verify_contained_value_type(&self, td: &TypeDefinition, place: &str) -> Result<()> {
        if td.container == ContainerKind::Generator {
            return Err(verify_err(format!(
                "generator containers are only valid as a function or callback return \
                 or final parameter, not {}",
                place
            )));
        }
        self.verify_value_type(td, place)
    }

    fn verify_pod_field(&self, td: &TypeDefinition, entry: &ServiceEntryDefinition) -> Result<()> {
        let place = format!("field '{}' of pod '{}'", td_name(td), entry.name);
        if td.container != ContainerKind::None {
            return Err(verify_err(format!("{} cannot have a container", place)));
        }
        if !matches!(
            td.array,
            ArrayShape::None
                | ArrayShape::Fixed(_)
                | ArrayShape::Bounded(_)
                | ArrayShape::FixedMultiDim(_)
        ) {
            return Err(verify_err(format!(
                "{} must use a fixed or bounded array shape",
                place
            )));
        }
        match &td.data_type {
            t if t.is_numeric() => Ok(()),
            DataType::Named(n) => {
                let resolved = self.resolve_type(td, n)?;
                match resolved.kind {
                    NamedTypeKind::Pod | NamedTypeKind::NamedArray => Ok(()),
                    _ => Err(verify_err(format!(
                        "{} must be numeric, pod, or namedarray",
                        place
                    ))),
                }
            }
            _ => Err(verify_err(format!(
                "{} must be numeric, pod, or namedarray",
                place
            ))),
        }
    }

    fn verify_namedarray_field(
        &self,
        td: &TypeDefinition,
        entry: &ServiceEntryDefinition,
    ) -> Result<()> {
        let place = format!("field '{}' of namedarray '{}'", td_name(td), entry.name);
        if td.container != ContainerKind::None {
            return Err(verify_err(format!("{} cannot have a container", place)));
        }
        if !matches!(td.array, ArrayShape::None | ArrayShape::Fixed(_)) {
            return Err(verify_err(format!(
                "{} must be a scalar or fixed array",
                place
            )));
        }
        match &td.data_type {
            t if t.is_numeric() => Ok(()),
            DataType::Named(n) => {
                let resolved = self.resolve_type(td, n)?;
                match resolved.kind {
                    NamedTypeKind::NamedArray => Ok(()),
                    _ => Err(verify_err(format!(
                        "{} must be numeric or namedarray",
                        place
                    ))),
                }
            }
            _ => Err(verify_err(format!(
                "{} must be numeric or namedarray",
                place
            ))),
        }
    }

    fn verify_return_type(&self, td: &TypeDefinition, place: &str) -> Result<()> {
        if td.data_type == DataType::Void {
            if td.array.is_array() || td.container != ContainerKind::None {
                return Err(verify_err(format!(
                    "void return of {} cannot have an array or container",
                    place
                )));
            }
            return Ok(());
        }
        if td.is_generator() {
            self.require_version("generators")?;
        }
        self.verify_value_type(td, place)
    }

    fn verify_params(&self, params: &[TypeDefinition], generator_ok: bool, place: &str) -> Result<()> {
        let mut names: HashSet<&str> = HashSet::new();
        for (i, param) in params.iter().enumerate() {
            check_declared_name(&param.name, "parameter")?;
            if !names.insert(param.name.as_str()) {
                return Err(verify_err(format!(
                    "duplicate parameter name '{}' in {}",
                    param.name, place
                )));
            }
            let last = i + 1 == params.len();
            if param.is_generator() {
                if !(generator_ok && last) {
                    return Err(verify_err(format!(
                        "generator containers are only valid as a function or callback \
                         return or final parameter, not parameter '{}' of {}",
                        param.name, place
                    )));
                }
                self.require_version("generators")?;
                self.verify_value_type(param, place)?;
            } else {
                self.verify_contained_value_type(param, place)?;
            }
        }
        Ok(())
    }

    fn verify_memory_type(&self, td: &TypeDefinition, place: &str) -> Result<()> {
        if td.container != ContainerKind::None {
            return Err(verify_err(format!("{} cannot have a container", place)));
        }
        if !matches!(td.array, ArrayShape::Variable | ArrayShape::VariableMultiDim) {
            return Err(verify_err(format!(
                "{} must be a variable-length array",
                place
            )));
        }
        match &td.data_type {
            t if t.is_numeric() => Ok(()),
            DataType::Named(n) => {
                let resolved = self.resolve_type(td, n)?;
                match resolved.kind {
                    NamedTypeKind::Pod | NamedTypeKind::NamedArray => Ok(()),
                    _ => Err(verify_err(format!(
                        "{} must be a numeric, pod, or namedarray array",
                        place
                    ))),
                }
            }
            _ => Err(verify_err(format!(
                "{} must be a numeric, pod, or namedarray array",
                place
            ))),
        }
    }

    // ===== Entries =====

    fn verify_entry(
        &self,
        entry: &'a ServiceEntryDefinition,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let mut names: HashSet<&str> = HashSet::new();
        for constant in &entry.constants {
            check_declared_name(&constant.name, "constant")?;
            if !names.insert(constant.name.as_str()) {
                return Err(verify_err(format!(
                    "duplicate name '{}' in {} '{}'",
                    constant.name,
                    entry.entry_kind.keyword(),
                    entry.name
                )));
            }
            self.verify_constant(constant, &|n| {
                entry.find_constant(n).or_else(|| self.def.find_constant(n))
            })?;
        }
        for member in &entry.members {
            check_declared_name(member.name(), "member")?;
            if !names.insert(member.name()) {
                return Err(verify_err(format!(
                    "duplicate name '{}' in {} '{}'",
                    member.name(),
                    entry.entry_kind.keyword(),
                    entry.name
                )));
            }
            for modifier in member.modifiers() {
                if !KNOWN_MODIFIERS.contains(&modifier.as_str()) {
                    warnings.push(format!(
                        "unknown modifier '{}' on member '{}.{}'",
                        modifier,
                        entry.name,
                        member.name()
                    ));
                }
            }
            match entry.entry_kind {
                EntryKind::Structure => self.verify_struct_member(entry, member)?,
                EntryKind::Pod => self.verify_plain_field(entry, member, true)?,
                EntryKind::NamedArray => self.verify_plain_field(entry, member, false)?,
                EntryKind::Object => self.verify_object_member(entry, member)?,
            }
        }
        Ok(())
    }

    fn verify_struct_member(
        &self,
        entry: &ServiceEntryDefinition,
        member: &MemberDefinition,
    ) -> Result<()> {
        let MemberDefinition::Property(p) = member else {
            return Err(verify_err(format!(
                "struct '{}' can only contain fields",
                entry.name
            )));
        };
        let place = format!("field '{}' of struct '{}'", p.name, entry.name);
        self.verify_contained_value_type(&p.type_def, &place)
    }

    fn verify_plain_field(
        &self,
        entry: &ServiceEntryDefinition,
        member: &MemberDefinition,
        pod: bool,
    ) -> Result<()> {
        let MemberDefinition::Property(p) = member else {
            return Err(verify_err(format!(
                "{} '{}' can only contain fields",
                entry.entry_kind.keyword(),
                entry.name
            )));
        };
        if pod {
            self.verify_pod_field(&p.type_def, entry)
        } else {
            self.verify_namedarray_field(&p.type_def, entry)
        }
    }

    fn verify_object_member(
        &self,
        entry: &ServiceEntryDefinition,
        member: &MemberDefinition,
    ) -> Result<()> {
        match member {
            MemberDefinition::Property(p) => {
                let place = format!("property '{}' of object '{}'", p.name, entry.name);
                self.verify_contained_value_type(&p.type_def, &place)
            }
            MemberDefinition::Function(f) => {
                let place = format!("function '{}' of object '{}'", f.name, entry.name);
                self.verify_return_type(&f.return_type, &place)?;
                self.verify_params(&f.params, true, &place)
            }
            MemberDefinition::Event(e) => {
                let place = format!("event '{}' of object '{}'", e.name, entry.name);
                self.verify_params(&e.params, false, &place)
            }
            MemberDefinition::ObjRef(o) => {
                if o.object_type == "varobject" {
                    return Ok(());
                }
                let resolved = self.resolve(&o.object_type)?;
                if resolved.kind != NamedTypeKind::Object {
                    return Err(verify_err(format!(
                        "objref '{}' of object '{}' must reference an object type",
                        o.name, entry.name
                    )));
                }
                Ok(())
            }
            MemberDefinition::Pipe(p) => {
                let place = format!("pipe '{}' of object '{}'", p.name, entry.name);
                self.verify_contained_value_type(&p.type_def, &place)
            }
            MemberDefinition::Callback(c) => {
                let place = format!("callback '{}' of object '{}'", c.name, entry.name);
                self.verify_return_type(&c.return_type, &place)?;
                self.verify_params(&c.params, true, &place)
            }
            MemberDefinition::Wire(w) => {
                let place = format!("wire '{}' of object '{}'", w.name, entry.name);
                self.verify_contained_value_type(&w.type_def, &place)
            }
            MemberDefinition::Memory(m) => {
                let place = format!("memory '{}' of object '{}'", m.name, entry.name);
                self.verify_memory_type(&m.type_def, &place)
            }
        }
    }

    // ===== Recursion through pods and namedarrays =====

    /// Walk pod/namedarray nesting. `visited` accumulates the qualified names
    /// on the current descent only; sibling fields each branch with their own
    /// copy so shared leaf types are not false positives.
    fn check_value_recursion(
        &self,
        def: &'a ServiceDefinition,
        entry: &ServiceEntryDefinition,
        visited: &HashSet<String>,
    ) -> Result<()> {
        let qualified = format!("{}.{}", def.name, entry.name);
        if visited.contains(&qualified) {
            return Err(verify_err(format!(
                "recursive {} definition '{}'",
                entry.entry_kind.keyword(),
                qualified
            )));
        }
        let ctx = self.for_def(def);
        for member in &entry.members {
            let MemberDefinition::Property(p) = member else {
                continue;
            };
            let DataType::Named(n) = &p.type_def.data_type else {
                continue;
            };
            let resolved = ctx.resolve(n)?;
            if !matches!(
                resolved.kind,
                NamedTypeKind::Pod | NamedTypeKind::NamedArray
            ) {
                continue;
            }
            let target_def = if resolved.service == def.name {
                def
            } else {
                ctx.imported_def(&resolved.service, n)?
            };
            let Some(target) = target_def.find_entry(&resolved.name) else {
                continue;
            };
            let mut branch = visited.clone();
            branch.insert(qualified.clone());
            self.check_value_recursion(target_def, target, &branch)?;
        }
        Ok(())
    }

    // ===== Implements =====

    fn resolve_object_entry(
        &self,
        name: &str,
    ) -> Result<(String, &'a ServiceDefinition, &'a ServiceEntryDefinition)> {
        let resolved = self.resolve(name)?;
        if resolved.kind != NamedTypeKind::Object {
            return Err(verify_err(format!(
                "implements '{}' must reference an object type",
                name
            )));
        }
        let target_def = if resolved.service == self.def.name {
            self.def
        } else {
            self.imported_def(&resolved.service, name)?
        };
        let entry = target_def.find_object(&resolved.name).ok_or_else(|| {
            verify_err(format!("type '{}' not found", name))
        })?;
        Ok((resolved.qualified_name(), target_def, entry))
    }

    fn verify_object_implements(&self, object: &ServiceEntryDefinition) -> Result<()> {
        if object.implements.is_empty() {
            return Ok(());
        }
        let mut interfaces = Vec::new();
        let mut listed: HashSet<String> = HashSet::new();
        for name in &object.implements {
            let (qualified, target_def, entry) = self.resolve_object_entry(name)?;
            listed.insert(qualified.clone());
            interfaces.push((qualified, target_def, entry));
        }

        for (qualified, target_def, entry) in &interfaces {
            // Transitivity: everything an implemented interface itself
            // implements must also be listed.
            let ictx = self.for_def(target_def);
            for parent in &entry.implements {
                let (pq, _, _) = ictx.resolve_object_entry(parent)?;
                if !listed.contains(&pq) {
                    return Err(verify_err(format!(
                        "object '{}' implements '{}' and must also implement '{}'",
                        object.name, qualified, pq
                    )));
                }
            }
            for member in &entry.members {
                let Some(own) = object.get_member(member.name()) else {
                    return Err(verify_err(format!(
                        "object '{}' does not implement member '{}' of '{}'",
                        object.name,
                        member.name(),
                        qualified
                    )));
                };
                if !self.members_compatible(own, &ictx, member) {
                    return Err(verify_err(format!(
                        "member '{}' of object '{}' does not match the declaration in '{}'",
                        member.name(),
                        object.name,
                        qualified
                    )));
                }
            }
        }
        Ok(())
    }

    /// Signature comparison between an implementing member and an interface
    /// member: type, array shape, container kind, and parameter and return
    /// equality. Modifiers do not participate. Named types compare by their
    /// resolution so local and qualified spellings match.
    fn members_compatible(
        &self,
        own: &MemberDefinition,
        ictx: &TypeContext<'a>,
        iface: &MemberDefinition,
    ) -> bool {
        match (own, iface) {
            (MemberDefinition::Property(a), MemberDefinition::Property(b)) => {
                self.types_compatible(&a.type_def, ictx, &b.type_def)
            }
            (MemberDefinition::Function(a), MemberDefinition::Function(b)) => {
                self.types_compatible(&a.return_type, ictx, &b.return_type)
                    && self.param_lists_compatible(&a.params, ictx, &b.params)
            }
            (MemberDefinition::Event(a), MemberDefinition::Event(b)) => {
                self.param_lists_compatible(&a.params, ictx, &b.params)
            }
            (MemberDefinition::ObjRef(a), MemberDefinition::ObjRef(b)) => {
                a.index == b.index
                    && match (a.object_type.as_str(), b.object_type.as_str()) {
                        ("varobject", "varobject") => true,
                        ("varobject", _) | (_, "varobject") => false,
                        (x, y) => matches!(
                            (self.resolve(x), ictx.resolve(y)),
                            (Ok(ra), Ok(rb)) if ra == rb
                        ),
                    }
            }
            (MemberDefinition::Pipe(a), MemberDefinition::Pipe(b)) => {
                self.types_compatible(&a.type_def, ictx, &b.type_def)
            }
            (MemberDefinition::Callback(a), MemberDefinition::Callback(b)) => {
                self.types_compatible(&a.return_type, ictx, &b.return_type)
                    && self.param_lists_compatible(&a.params, ictx, &b.params)
            }
            (MemberDefinition::Wire(a), MemberDefinition::Wire(b)) => {
                self.types_compatible(&a.type_def, ictx, &b.type_def)
            }
            (MemberDefinition::Memory(a), MemberDefinition::Memory(b)) => {
                self.types_compatible(&a.type_def, ictx, &b.type_def)
            }
            _ => false,
        }
    }

    fn param_lists_compatible(
        &self,
        own: &[TypeDefinition],
        ictx: &TypeContext<'a>,
        iface: &[TypeDefinition],
    ) -> bool {
        own.len() == iface.len()
            && own.iter().zip(iface).all(|(a, b)| {
                a.name == b.name && self.types_compatible(a, ictx, b)
            })
    }

    fn types_compatible(
        &self,
        own: &TypeDefinition,
        ictx: &TypeContext<'a>,
        iface: &TypeDefinition,
    ) -> bool {
        if own.array != iface.array || own.container != iface.container {
            return false;
        }
        match (&own.data_type, &iface.data_type) {
            (DataType::Named(a), DataType::Named(b)) => {
                matches!(
                    (self.resolve(a), ictx.resolve(b)),
                    (Ok(ra), Ok(rb)) if ra == rb
                )
            }
            (a, b) => a == b,
        }
    }

    // ===== Constants =====

    fn verify_constant(
        &self,
        constant: &ConstantDefinition,
        lookup: &dyn Fn(&str) -> Option<&'a ConstantDefinition>,
    ) -> Result<()> {
        constant
            .verify_value()
            .map_err(|e| verify_err(e.to_string()))?;
        if constant.type_def.data_type.is_named() {
            self.require_version("struct constants")?;
            let DataType::Named(n) = &constant.type_def.data_type else {
                unreachable!("is_named checked");
            };
            let resolved = self.resolve_type(&constant.type_def, n)?;
            if resolved.kind != NamedTypeKind::Structure {
                return Err(verify_err(format!(
                    "constant '{}' must have a struct type, not '{}'",
                    constant.name, n
                )));
            }
            let mut parents = Vec::new();
            self.check_constant_refs(constant, lookup, &mut parents)?;
        }
        Ok(())
    }

    /// Resolve every constant referenced by a struct constant, rejecting
    /// cycles via the accumulated parent path.
    fn check_constant_refs(
        &self,
        constant: &ConstantDefinition,
        lookup: &dyn Fn(&str) -> Option<&'a ConstantDefinition>,
        parents: &mut Vec<String>,
    ) -> Result<()> {
        parents.push(constant.name.clone());
        let fields = constant
            .struct_fields()
            .map_err(|e| verify_err(e.to_string()))?;
        for field in &fields {
            if parents.iter().any(|p| p == &field.constant_ref) {
                return Err(verify_err(format!(
                    "cyclic constant reference '{}' in constant '{}'",
                    field.constant_ref, constant.name
                )));
            }
            let Some(target) = lookup(&field.constant_ref) else {
                return Err(verify_err(format!(
                    "constant '{}' referenced by '{}' not found",
                    field.constant_ref, constant.name
                )));
            };
            if target.type_def.data_type.is_named() {
                self.check_constant_refs(target, lookup, parents)?;
            }
        }
        parents.pop();
        Ok(())
    }
}

fn td_name(td: &TypeDefinition) -> &str {
    if td.name.is_empty() {
        "<unnamed>"
    } else {
        &td.name
    }
}
