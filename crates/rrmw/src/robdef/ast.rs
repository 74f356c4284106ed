// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Service definition abstract syntax tree.
//!
//! A [`ServiceDefinition`] is the parsed form of one `.robdef` document:
//! header lines (service name, standard version, options, imports, using
//! aliases), flat declarations (exceptions, constants, enums), and block
//! entries (structs, pods, namedarrays, objects) with their members.
//!
//! Every node regenerates its textual form through `Display`; a definition
//! printed and re-parsed compares structurally equal
//! ([`compare_service_definitions`]).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::robdef::types::{ContainerKind, DataType, TypeDefinition};

// ============================================================================
// Standard version
// ============================================================================

/// Version of the service definition standard a document declares, either
/// through `stdver` or the legacy `option version` line.
///
/// Comparison is numeric over all four components; `0.9` equals `0.9.0`.
/// Display preserves the number of components originally written.
#[derive(Debug, Clone)]
pub struct StdVer {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub tweak: u16,
    segments: u8,
}

impl StdVer {
    pub fn new(major: u16, minor: u16) -> Self {
        StdVer {
            major,
            minor,
            patch: 0,
            tweak: 0,
            segments: 2,
        }
    }

    fn key(&self) -> (u16, u16, u16, u16) {
        (self.major, self.minor, self.patch, self.tweak)
    }
}

impl PartialEq for StdVer {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for StdVer {}

impl PartialOrd for StdVer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StdVer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for StdVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.segments >= 3 {
            write!(f, ".{}", self.patch)?;
        }
        if self.segments >= 4 {
            write!(f, ".{}", self.tweak)?;
        }
        Ok(())
    }
}

impl FromStr for StdVer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(Error::ServiceDefinition(format!(
                "invalid version string: '{}'",
                s
            )));
        }
        let mut nums = [0u16; 4];
        for (i, p) in parts.iter().enumerate() {
            nums[i] = p.parse::<u16>().map_err(|_| {
                Error::ServiceDefinition(format!("invalid version string: '{}'", s))
            })?;
        }
        Ok(StdVer {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            tweak: nums[3],
            segments: parts.len() as u8,
        })
    }
}

// ============================================================================
// Header declarations
// ============================================================================

/// `using other.service.Type [as Alias]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingDefinition {
    /// Fully qualified imported type name.
    pub qualified: String,
    /// Local alias; by default the last segment of `qualified`.
    pub alias: String,
}

impl UsingDefinition {
    /// The unqualified tail of the qualified name.
    pub fn default_alias(qualified: &str) -> &str {
        qualified.rsplit('.').next().unwrap_or(qualified)
    }
}

impl fmt::Display for UsingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alias == Self::default_alias(&self.qualified) {
            write!(f, "using {}", self.qualified)
        } else {
            write!(f, "using {} as {}", self.qualified, self.alias)
        }
    }
}

// ============================================================================
// Constants
// ============================================================================

/// `constant <type> <name> <value>`.
///
/// The value is kept as written; typed accessors parse it on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDefinition {
    pub name: String,
    pub type_def: TypeDefinition,
    /// Raw literal text: number, `{1,2,3}` array, `"..."` string, or
    /// `{field: constname, ...}` struct form.
    pub value: String,
}

/// One field of a struct-form constant, referring to a sibling constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantStructField {
    pub name: String,
    pub constant_ref: String,
}

fn string_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^"(?:[^"\\]|\\["\\/bfnrt]|\\u[0-9a-fA-F]{4})*"$"#)
            .unwrap_or_else(|e| panic!("string literal regex: {}", e))
    })
}

fn escape_sequence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\\(["\\/bfnrt]|u[0-9a-fA-F]{4})"#)
            .unwrap_or_else(|e| panic!("escape sequence regex: {}", e))
    })
}

/// Replace every escape sequence in a validated literal body in one pass.
fn unescape_string_body(body: &str) -> Result<String> {
    let mut bad_codepoint = None;
    let out = escape_sequence_regex().replace_all(body, |caps: &regex::Captures<'_>| {
        let seq = &caps[1];
        match seq {
            "\"" => "\"".to_string(),
            "\\" => "\\".to_string(),
            "/" => "/".to_string(),
            "b" => "\u{0008}".to_string(),
            "f" => "\u{000c}".to_string(),
            "n" => "\n".to_string(),
            "r" => "\r".to_string(),
            "t" => "\t".to_string(),
            _ => {
                let code = u32::from_str_radix(&seq[1..], 16).unwrap_or(u32::MAX);
                match char::from_u32(code) {
                    Some(c) => c.to_string(),
                    None => {
                        bad_codepoint = Some(code);
                        String::new()
                    }
                }
            }
        }
    });
    match bad_codepoint {
        Some(code) => Err(Error::DataType(format!(
            "invalid \\u escape code point {:#06x} in string constant",
            code
        ))),
        None => Ok(out.into_owned()),
    }
}

fn integer_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:0[xX][0-9a-fA-F]+|[0-9]+)$")
            .unwrap_or_else(|e| panic!("integer literal regex: {}", e))
    })
}

fn float_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:(?:[0-9]+\.[0-9]*|\.[0-9]+|[0-9]+)(?:[eE][+-]?[0-9]+)?|inf|nan)$")
            .unwrap_or_else(|e| panic!("float literal regex: {}", e))
    })
}

fn struct_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\s*(?:[A-Za-z]\w*\s*:\s*[A-Za-z]\w*(?:\s*,\s*[A-Za-z]\w*\s*:\s*[A-Za-z]\w*)*)?\s*\}$")
            .unwrap_or_else(|e| panic!("struct constant regex: {}", e))
    })
}

/// Parse one integer literal, decimal or hex, with optional sign.
fn parse_integer_literal(text: &str) -> Option<i128> {
    if !integer_literal_regex().is_match(text) {
        return None;
    }
    let (negative, digits) = match text.as_bytes()[0] {
        b'+' => (false, &text[1..]),
        b'-' => (true, &text[1..]),
        _ => (false, text),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Inclusive value bounds of an integer type.
fn integer_bounds(t: &DataType) -> Option<(i128, i128)> {
    Some(match t {
        DataType::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
        DataType::UInt8 => (0, i128::from(u8::MAX)),
        DataType::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
        DataType::UInt16 => (0, i128::from(u16::MAX)),
        DataType::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
        DataType::UInt32 => (0, i128::from(u32::MAX)),
        DataType::Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
        DataType::UInt64 => (0, i128::from(u64::MAX)),
        _ => return None,
    })
}

impl ConstantDefinition {
    /// Verify the raw value against the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataType`] naming the constant when the literal does
    /// not lex, does not fit the declared type, or has the wrong shape.
    pub fn verify_value(&self) -> Result<()> {
        if self.type_def.container != ContainerKind::None {
            return Err(Error::DataType(format!(
                "constant '{}' cannot have a container type",
                self.name
            )));
        }
        match &self.type_def.data_type {
            t if t.is_integer() => self.verify_numeric(|e| {
                let v = parse_integer_literal(e).ok_or_else(|| self.bad_value())?;
                let (lo, hi) = integer_bounds(t).ok_or_else(|| self.bad_value())?;
                if v < lo || v > hi {
                    return Err(Error::DataType(format!(
                        "constant '{}' value {} out of range for {}",
                        self.name,
                        v,
                        t.keyword()
                    )));
                }
                Ok(())
            }),
            t if t.is_float() => self.verify_numeric(|e| {
                if !float_literal_regex().is_match(e) || e.parse::<f64>().is_err() {
                    return Err(self.bad_value());
                }
                Ok(())
            }),
            DataType::String => self.value_to_string().map(|_| ()),
            DataType::Named(_) => self.struct_fields().map(|_| ()),
            _ => Err(Error::DataType(format!(
                "constant '{}' has unsupported type {}",
                self.name,
                self.type_def.type_string()
            ))),
        }
    }

    fn verify_numeric(&self, check: impl Fn(&str) -> Result<()>) -> Result<()> {
        if self.type_def.array.is_array() {
            for element in self.array_elements()? {
                check(element)?;
            }
            Ok(())
        } else {
            check(self.value.trim())
        }
    }

    /// Elements of a `{1, 2, 3}` array literal.
    fn array_elements(&self) -> Result<Vec<&str>> {
        let trimmed = self.value.trim();
        let body = trimmed
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .ok_or_else(|| self.bad_value())?;
        let body = body.trim();
        if body.is_empty() {
            return Ok(Vec::new());
        }
        Ok(body.split(',').map(str::trim).collect())
    }

    /// Decode a string constant, applying the escape grammar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataType`] when the constant is not a string or the
    /// literal is malformed.
    pub fn value_to_string(&self) -> Result<String> {
        if self.type_def.data_type != DataType::String || self.type_def.array.is_array() {
            return Err(Error::DataType(format!(
                "constant '{}' is not a string constant",
                self.name
            )));
        }
        let trimmed = self.value.trim();
        if !string_literal_regex().is_match(trimmed) {
            return Err(self.bad_value());
        }
        unescape_string_body(&trimmed[1..trimmed.len() - 1])
    }

    /// Fields of a struct-form constant, `{field: constname, ...}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataType`] when the constant is not struct-typed or
    /// the form is malformed.
    pub fn struct_fields(&self) -> Result<Vec<ConstantStructField>> {
        if !self.type_def.data_type.is_named() {
            return Err(Error::DataType(format!(
                "constant '{}' is not a struct constant",
                self.name
            )));
        }
        let trimmed = self.value.trim();
        if !struct_value_regex().is_match(trimmed) {
            return Err(self.bad_value());
        }
        let body = &trimmed[1..trimmed.len() - 1];
        let mut fields = Vec::new();
        for pair in body.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (field, reference) = pair
                .split_once(':')
                .ok_or_else(|| self.bad_value())?;
            fields.push(ConstantStructField {
                name: field.trim().to_string(),
                constant_ref: reference.trim().to_string(),
            });
        }
        Ok(fields)
    }

    fn bad_value(&self) -> Error {
        Error::DataType(format!(
            "constant '{}' has invalid value '{}' for type {}",
            self.name,
            self.value.trim(),
            self.type_def.type_string()
        ))
    }
}

impl fmt::Display for ConstantDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "constant {} {} {}",
            self.type_def.type_string(),
            self.name,
            self.value
        )
    }
}

// ============================================================================
// Enums
// ============================================================================

/// `enum <name>` block with comma-separated values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<EnumValueDefinition>,
}

/// One enum value. `implicit_value` and `hex_value` record how the value was
/// written and only affect regeneration, not equality.
#[derive(Debug, Clone)]
pub struct EnumValueDefinition {
    pub name: String,
    pub value: i64,
    pub implicit_value: bool,
    pub hex_value: bool,
}

impl PartialEq for EnumValueDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl Eq for EnumValueDefinition {}

impl fmt::Display for EnumDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "enum {}", self.name)?;
        for (i, v) in self.values.iter().enumerate() {
            let sep = if i + 1 == self.values.len() { "" } else { "," };
            if v.implicit_value {
                writeln!(f, "{}{}", v.name, sep)?;
            } else if v.hex_value {
                let text = if v.value < 0 {
                    format!("-0x{:x}", -(v.value as i128))
                } else {
                    format!("0x{:x}", v.value)
                };
                writeln!(f, "{} = {}{}", v.name, text, sep)?;
            } else {
                writeln!(f, "{} = {}{}", v.name, v.value, sep)?;
            }
        }
        write!(f, "end")
    }
}

// ============================================================================
// Members
// ============================================================================

/// `property`/`field` member.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub name: String,
    pub type_def: TypeDefinition,
    pub modifiers: Vec<String>,
}

/// `function` member.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub return_type: TypeDefinition,
    pub params: Vec<TypeDefinition>,
    pub modifiers: Vec<String>,
}

impl FunctionDefinition {
    /// Generator functions carry a `{generator}` container on the return
    /// type or on the final parameter.
    pub fn is_generator(&self) -> bool {
        self.return_type.is_generator() || self.params.last().is_some_and(|p| p.is_generator())
    }
}

/// `event` member.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub name: String,
    pub params: Vec<TypeDefinition>,
    pub modifiers: Vec<String>,
}

/// Index mode of an `objref` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjRefIndex {
    None,
    /// `Type[]`: indexed by int32.
    Array,
    /// `Type{int32}`.
    MapInt32,
    /// `Type{string}`.
    MapString,
}

/// `objref` member.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjRefDefinition {
    pub name: String,
    /// Referenced object type, possibly qualified, or `varobject`.
    pub object_type: String,
    pub index: ObjRefIndex,
    pub modifiers: Vec<String>,
}

/// `pipe` member.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeDefinition {
    pub name: String,
    pub type_def: TypeDefinition,
    pub modifiers: Vec<String>,
}

impl PipeDefinition {
    pub fn is_unreliable(&self) -> bool {
        self.modifiers.iter().any(|m| m == "unreliable")
    }
}

/// `callback` member.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackDefinition {
    pub name: String,
    pub return_type: TypeDefinition,
    pub params: Vec<TypeDefinition>,
    pub modifiers: Vec<String>,
}

/// `wire` member.
#[derive(Debug, Clone, PartialEq)]
pub struct WireDefinition {
    pub name: String,
    pub type_def: TypeDefinition,
    pub modifiers: Vec<String>,
}

/// `memory` member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDefinition {
    pub name: String,
    pub type_def: TypeDefinition,
    pub modifiers: Vec<String>,
}

/// Any member of a service entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberDefinition {
    Property(PropertyDefinition),
    Function(FunctionDefinition),
    Event(EventDefinition),
    ObjRef(ObjRefDefinition),
    Pipe(PipeDefinition),
    Callback(CallbackDefinition),
    Wire(WireDefinition),
    Memory(MemoryDefinition),
}

impl MemberDefinition {
    pub fn name(&self) -> &str {
        match self {
            MemberDefinition::Property(m) => &m.name,
            MemberDefinition::Function(m) => &m.name,
            MemberDefinition::Event(m) => &m.name,
            MemberDefinition::ObjRef(m) => &m.name,
            MemberDefinition::Pipe(m) => &m.name,
            MemberDefinition::Callback(m) => &m.name,
            MemberDefinition::Wire(m) => &m.name,
            MemberDefinition::Memory(m) => &m.name,
        }
    }

    pub fn modifiers(&self) -> &[String] {
        match self {
            MemberDefinition::Property(m) => &m.modifiers,
            MemberDefinition::Function(m) => &m.modifiers,
            MemberDefinition::Event(m) => &m.modifiers,
            MemberDefinition::ObjRef(m) => &m.modifiers,
            MemberDefinition::Pipe(m) => &m.modifiers,
            MemberDefinition::Callback(m) => &m.modifiers,
            MemberDefinition::Wire(m) => &m.modifiers,
            MemberDefinition::Memory(m) => &m.modifiers,
        }
    }

    /// Member keyword, with `property` for property members; struct bodies
    /// print them as `field`.
    pub fn keyword(&self) -> &'static str {
        match self {
            MemberDefinition::Property(_) => "property",
            MemberDefinition::Function(_) => "function",
            MemberDefinition::Event(_) => "event",
            MemberDefinition::ObjRef(_) => "objref",
            MemberDefinition::Pipe(_) => "pipe",
            MemberDefinition::Callback(_) => "callback",
            MemberDefinition::Wire(_) => "wire",
            MemberDefinition::Memory(_) => "memory",
        }
    }

    /// Declaration line as it appears inside an entry of `kind`.
    fn decl_string(&self, kind: EntryKind) -> String {
        let mut line = match self {
            MemberDefinition::Property(m) => {
                let keyword = if kind == EntryKind::Object {
                    "property"
                } else {
                    "field"
                };
                format!("{} {} {}", keyword, m.type_def.type_string(), m.name)
            }
            MemberDefinition::Function(m) => format!(
                "function {} {}({})",
                m.return_type.type_string(),
                m.name,
                param_list(&m.params)
            ),
            MemberDefinition::Event(m) => {
                format!("event {}({})", m.name, param_list(&m.params))
            }
            MemberDefinition::ObjRef(m) => {
                let index = match m.index {
                    ObjRefIndex::None => "",
                    ObjRefIndex::Array => "[]",
                    ObjRefIndex::MapInt32 => "{int32}",
                    ObjRefIndex::MapString => "{string}",
                };
                format!("objref {}{} {}", m.object_type, index, m.name)
            }
            MemberDefinition::Pipe(m) => {
                format!("pipe {} {}", m.type_def.type_string(), m.name)
            }
            MemberDefinition::Callback(m) => format!(
                "callback {} {}({})",
                m.return_type.type_string(),
                m.name,
                param_list(&m.params)
            ),
            MemberDefinition::Wire(m) => {
                format!("wire {} {}", m.type_def.type_string(), m.name)
            }
            MemberDefinition::Memory(m) => {
                format!("memory {} {}", m.type_def.type_string(), m.name)
            }
        };
        if !self.modifiers().is_empty() {
            line.push_str(&format!(" [{}]", self.modifiers().join(",")));
        }
        line
    }
}

fn param_list(params: &[TypeDefinition]) -> String {
    let parts: Vec<String> = params.iter().map(|p| p.to_string()).collect();
    parts.join(", ")
}

// ============================================================================
// Entries
// ============================================================================

/// Kind of a block entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Structure,
    Pod,
    NamedArray,
    Object,
}

impl EntryKind {
    pub fn keyword(self) -> &'static str {
        match self {
            EntryKind::Structure => "struct",
            EntryKind::Pod => "pod",
            EntryKind::NamedArray => "namedarray",
            EntryKind::Object => "object",
        }
    }
}

/// One block entry: struct, pod, namedarray, or object.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEntryDefinition {
    pub name: String,
    pub entry_kind: EntryKind,
    /// Members in declaration order.
    pub members: Vec<MemberDefinition>,
    /// Implemented object types; objects only.
    pub implements: Vec<String>,
    pub options: Vec<String>,
    pub constants: Vec<ConstantDefinition>,
}

impl ServiceEntryDefinition {
    pub fn new(name: &str, entry_kind: EntryKind) -> Self {
        ServiceEntryDefinition {
            name: name.to_string(),
            entry_kind,
            members: Vec::new(),
            implements: Vec::new(),
            options: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn get_member(&self, name: &str) -> Option<&MemberDefinition> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn find_constant(&self, name: &str) -> Option<&ConstantDefinition> {
        self.constants.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for ServiceEntryDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.entry_kind.keyword(), self.name)?;
        for implemented in &self.implements {
            writeln!(f, "implements {}", implemented)?;
        }
        for option in &self.options {
            writeln!(f, "option {}", option)?;
        }
        for constant in &self.constants {
            writeln!(f, "{}", constant)?;
        }
        for member in &self.members {
            writeln!(f, "{}", member.decl_string(self.entry_kind))?;
        }
        write!(f, "end")
    }
}

// ============================================================================
// Service definition
// ============================================================================

/// One parsed service definition document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDefinition {
    /// Dotted service name, e.g. `experimental.create2`.
    pub name: String,
    pub stdver: Option<StdVer>,
    pub options: Vec<String>,
    pub imports: Vec<String>,
    pub usings: Vec<UsingDefinition>,
    pub exceptions: Vec<String>,
    pub constants: Vec<ConstantDefinition>,
    pub enums: Vec<EnumDefinition>,
    pub structures: Vec<ServiceEntryDefinition>,
    pub pods: Vec<ServiceEntryDefinition>,
    pub namedarrays: Vec<ServiceEntryDefinition>,
    pub objects: Vec<ServiceEntryDefinition>,
}

impl ServiceDefinition {
    /// Parse definition text, discarding warnings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] carrying the 1-based line of the first
    /// failure.
    pub fn from_string(text: &str) -> Result<Self> {
        let mut warnings = Vec::new();
        Self::from_string_with_warnings(text, &mut warnings)
    }

    /// Parse definition text, appending non-fatal advisories to `warnings`.
    pub fn from_string_with_warnings(text: &str, warnings: &mut Vec<String>) -> Result<Self> {
        crate::robdef::parser::parse_definition(text, warnings)
    }

    /// Read and parse a definition file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_string(&text)
    }

    /// Effective declared standard version: `stdver` if present, else a
    /// legacy `option version` line.
    pub fn declared_version(&self) -> Option<StdVer> {
        if self.stdver.is_some() {
            return self.stdver.clone();
        }
        for option in &self.options {
            let mut parts = option.split_whitespace();
            if parts.next() == Some("version") {
                if let Some(v) = parts.next() {
                    if let Ok(ver) = v.parse::<StdVer>() {
                        return Some(ver);
                    }
                }
            }
        }
        None
    }

    /// Look up a block entry by unqualified name across all namespaces.
    pub fn find_entry(&self, name: &str) -> Option<&ServiceEntryDefinition> {
        self.structures
            .iter()
            .chain(&self.pods)
            .chain(&self.namedarrays)
            .chain(&self.objects)
            .find(|e| e.name == name)
    }

    pub fn find_object(&self, name: &str) -> Option<&ServiceEntryDefinition> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn find_constant(&self, name: &str) -> Option<&ConstantDefinition> {
        self.constants.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "service {}", self.name)?;
        if let Some(v) = &self.stdver {
            writeln!(f, "stdver {}", v)?;
        }
        for option in &self.options {
            writeln!(f, "option {}", option)?;
        }
        for import in &self.imports {
            writeln!(f, "import {}", import)?;
        }
        for using in &self.usings {
            writeln!(f, "{}", using)?;
        }
        for exception in &self.exceptions {
            writeln!(f, "exception {}", exception)?;
        }
        for constant in &self.constants {
            writeln!(f, "{}", constant)?;
        }
        for e in &self.enums {
            writeln!(f, "\n{}", e)?;
        }
        for entry in self
            .structures
            .iter()
            .chain(&self.pods)
            .chain(&self.namedarrays)
            .chain(&self.objects)
        {
            writeln!(f, "\n{}", entry)?;
        }
        Ok(())
    }
}

impl FromStr for ServiceDefinition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_string(s)
    }
}

// ============================================================================
// Structural comparison
// ============================================================================

/// Structural equality of two definitions.
///
/// Presentation details that regeneration may normalize (implicit and hex
/// enum values) do not participate; everything else, including member order
/// and modifiers, does.
pub fn compare_service_definitions(a: &ServiceDefinition, b: &ServiceDefinition) -> bool {
    a == b
}

/// Structural equality of two block entries.
pub fn compare_service_entries(a: &ServiceEntryDefinition, b: &ServiceEntryDefinition) -> bool {
    a == b
}
