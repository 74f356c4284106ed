// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Type descriptions used by service definitions.
//!
//! A [`TypeDefinition`] captures one declared datum: primitive or named
//! base type, array shape, and container wrapping, in the textual order
//! they appear (`base[array]{container}`, e.g. `double[3]{list}`).

use std::fmt;
use std::sync::OnceLock;

/// Base data type of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Void,
    Double,
    Single,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    String,
    CDouble,
    CSingle,
    Bool,
    /// Wildcard value type, resolved at runtime.
    VarValue,
    /// Wildcard object type, resolved at runtime.
    VarObject,
    /// User-defined type, possibly qualified with a dotted service name.
    Named(String),
}

impl DataType {
    /// Map a primitive keyword to its type. Returns `None` for identifiers
    /// that are not primitive keywords.
    pub fn from_keyword(s: &str) -> Option<DataType> {
        Some(match s {
            "void" => DataType::Void,
            "double" => DataType::Double,
            "single" => DataType::Single,
            "int8" => DataType::Int8,
            "uint8" => DataType::UInt8,
            "int16" => DataType::Int16,
            "uint16" => DataType::UInt16,
            "int32" => DataType::Int32,
            "uint32" => DataType::UInt32,
            "int64" => DataType::Int64,
            "uint64" => DataType::UInt64,
            "string" => DataType::String,
            "cdouble" => DataType::CDouble,
            "csingle" => DataType::CSingle,
            "bool" => DataType::Bool,
            "varvalue" => DataType::VarValue,
            "varobject" => DataType::VarObject,
            _ => return None,
        })
    }

    /// The keyword or type name as written in definition text.
    pub fn keyword(&self) -> &str {
        match self {
            DataType::Void => "void",
            DataType::Double => "double",
            DataType::Single => "single",
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Int64 => "int64",
            DataType::UInt64 => "uint64",
            DataType::String => "string",
            DataType::CDouble => "cdouble",
            DataType::CSingle => "csingle",
            DataType::Bool => "bool",
            DataType::VarValue => "varvalue",
            DataType::VarObject => "varobject",
            DataType::Named(n) => n,
        }
    }

    /// Numeric types, including complex and bool.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Double
                | DataType::Single
                | DataType::Int8
                | DataType::UInt8
                | DataType::Int16
                | DataType::UInt16
                | DataType::Int32
                | DataType::UInt32
                | DataType::Int64
                | DataType::UInt64
                | DataType::CDouble
                | DataType::CSingle
                | DataType::Bool
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::UInt8
                | DataType::Int16
                | DataType::UInt16
                | DataType::Int32
                | DataType::UInt32
                | DataType::Int64
                | DataType::UInt64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Double | DataType::Single)
    }

    pub fn is_named(&self) -> bool {
        matches!(self, DataType::Named(_))
    }
}

/// Array shape of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayShape {
    /// Scalar.
    None,
    /// `[8]`: exactly eight elements.
    Fixed(u32),
    /// `[8-]`: up to eight elements.
    Bounded(u32),
    /// `[]`: any length.
    Variable,
    /// `[2,3]`: fixed multi-dimensional.
    FixedMultiDim(Vec<u32>),
    /// `[*]`: multi-dimensional, shape carried with the value.
    VariableMultiDim,
}

impl ArrayShape {
    pub fn is_array(&self) -> bool {
        !matches!(self, ArrayShape::None)
    }

    /// Fixed or bounded shapes whose maximum element count is known.
    pub fn is_fixed_size(&self) -> bool {
        matches!(
            self,
            ArrayShape::Fixed(_) | ArrayShape::Bounded(_) | ArrayShape::FixedMultiDim(_)
        )
    }
}

impl fmt::Display for ArrayShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayShape::None => Ok(()),
            ArrayShape::Fixed(n) => write!(f, "[{}]", n),
            ArrayShape::Bounded(n) => write!(f, "[{}-]", n),
            ArrayShape::Variable => write!(f, "[]"),
            ArrayShape::FixedMultiDim(dims) => {
                let text: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                write!(f, "[{}]", text.join(","))
            }
            ArrayShape::VariableMultiDim => write!(f, "[*]"),
        }
    }
}

/// Container wrapping of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    None,
    /// `{list}`
    List,
    /// `{int32}`: map keyed by int32.
    MapInt32,
    /// `{string}`: map keyed by string.
    MapString,
    /// `{generator}`: lazily produced sequence.
    Generator,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::None => Ok(()),
            ContainerKind::List => write!(f, "{{list}}"),
            ContainerKind::MapInt32 => write!(f, "{{int32}}"),
            ContainerKind::MapString => write!(f, "{{string}}"),
            ContainerKind::Generator => write!(f, "{{generator}}"),
        }
    }
}

/// What a named type resolved to, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNamedType {
    pub kind: NamedTypeKind,
    /// Defining service name.
    pub service: String,
    /// Unqualified type name within the defining service.
    pub name: String,
}

impl ResolvedNamedType {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.service, self.name)
    }
}

/// Namespace a named type lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedTypeKind {
    Structure,
    Pod,
    NamedArray,
    Object,
    Enum,
    Exception,
}

/// One declared datum: base type, array shape, container, and the declared
/// name when the datum is a parameter.
#[derive(Debug)]
pub struct TypeDefinition {
    /// Parameter name; empty for return and member types.
    pub name: String,
    pub data_type: DataType,
    pub array: ArrayShape,
    pub container: ContainerKind,
    /// Memoized result of named-type resolution. Valid for the definition
    /// set the type was verified against; cleared on clone.
    resolved: OnceLock<ResolvedNamedType>,
}

impl TypeDefinition {
    pub fn new(data_type: DataType) -> Self {
        TypeDefinition {
            name: String::new(),
            data_type,
            array: ArrayShape::None,
            container: ContainerKind::None,
            resolved: OnceLock::new(),
        }
    }

    pub fn void() -> Self {
        TypeDefinition::new(DataType::Void)
    }

    /// Textual form without the parameter name, e.g. `double[3]{list}`.
    pub fn type_string(&self) -> String {
        format!("{}{}{}", self.data_type.keyword(), self.array, self.container)
    }

    pub fn is_generator(&self) -> bool {
        self.container == ContainerKind::Generator
    }

    /// Cached resolution, when this type has been resolved before.
    pub fn cached_resolution(&self) -> Option<&ResolvedNamedType> {
        self.resolved.get()
    }

    /// Store a resolution result. First store wins; later identical stores
    /// are no-ops.
    pub(crate) fn cache_resolution(&self, resolved: ResolvedNamedType) {
        let _ = self.resolved.set(resolved);
    }
}

impl Clone for TypeDefinition {
    fn clone(&self) -> Self {
        TypeDefinition {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            array: self.array.clone(),
            container: self.container,
            resolved: OnceLock::new(),
        }
    }
}

impl PartialEq for TypeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && self.array == other.array
            && self.container == other.container
    }
}

impl Eq for TypeDefinition {}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.type_string())
        } else {
            write!(f, "{} {}", self.type_string(), self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_keywords_round_trip() {
        for kw in [
            "void", "double", "single", "int8", "uint8", "int16", "uint16", "int32", "uint32",
            "int64", "uint64", "string", "cdouble", "csingle", "bool", "varvalue", "varobject",
        ] {
            let t = DataType::from_keyword(kw).unwrap();
            assert_eq!(t.keyword(), kw);
        }
        assert!(DataType::from_keyword("float64").is_none());
    }

    #[test]
    fn numeric_classification() {
        assert!(DataType::Bool.is_numeric());
        assert!(DataType::CDouble.is_numeric());
        assert!(!DataType::String.is_numeric());
        assert!(!DataType::VarValue.is_numeric());
        assert!(DataType::UInt64.is_integer());
        assert!(!DataType::Double.is_integer());
    }

    #[test]
    fn array_shape_display() {
        assert_eq!(ArrayShape::None.to_string(), "");
        assert_eq!(ArrayShape::Fixed(8).to_string(), "[8]");
        assert_eq!(ArrayShape::Bounded(8).to_string(), "[8-]");
        assert_eq!(ArrayShape::Variable.to_string(), "[]");
        assert_eq!(ArrayShape::FixedMultiDim(vec![2, 3]).to_string(), "[2,3]");
        assert_eq!(ArrayShape::VariableMultiDim.to_string(), "[*]");
    }

    #[test]
    fn type_string_orders_array_before_container() {
        let mut t = TypeDefinition::new(DataType::Double);
        t.array = ArrayShape::Variable;
        t.container = ContainerKind::List;
        assert_eq!(t.type_string(), "double[]{list}");
        t.name = "samples".to_string();
        assert_eq!(t.to_string(), "double[]{list} samples");
    }

    #[test]
    fn clone_drops_cached_resolution() {
        let t = TypeDefinition::new(DataType::Named("Foo".to_string()));
        t.cache_resolution(ResolvedNamedType {
            kind: NamedTypeKind::Structure,
            service: "svc".to_string(),
            name: "Foo".to_string(),
        });
        assert!(t.cached_resolution().is_some());
        let c = t.clone();
        assert!(c.cached_resolution().is_none());
        assert_eq!(t, c);
    }
}
