// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rrmw project

//! Line-oriented parser for service definition text.
//!
//! The input is split into logical lines first: whole-line `#` comments and
//! blank lines are dropped, a trailing backslash joins the next physical
//! line with a space, and any character outside printable ASCII (plus tab)
//! fails the parse. Logical lines keep the physical line number of their
//! first segment for error reporting.
//!
//! Top-level constructs must appear in order: `service`, then `stdver`,
//! then `import`, then `using`, then flat declarations (`exception`,
//! `constant`, `enum`), then block entries (`struct`, `pod`, `namedarray`,
//! `object`). `option` lines are accepted anywhere. Block entries run to a
//! matching `end` line, optionally qualified with the block keyword.

use crate::error::{Error, Result};
use crate::robdef::ast::{
    CallbackDefinition, ConstantDefinition, EntryKind, EnumDefinition, EnumValueDefinition,
    EventDefinition, FunctionDefinition, MemberDefinition, MemoryDefinition, ObjRefDefinition,
    ObjRefIndex, PipeDefinition, PropertyDefinition, ServiceDefinition, ServiceEntryDefinition,
    StdVer, UsingDefinition, WireDefinition,
};
use crate::robdef::types::{ArrayShape, ContainerKind, DataType, TypeDefinition};

/// One logical line and the physical line number it started on.
#[derive(Debug, Clone)]
struct Line {
    number: usize,
    text: String,
}

fn parse_err(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

/// Split text into logical lines.
fn logical_lines(text: &str) -> Result<Vec<Line>> {
    let mut out: Vec<Line> = Vec::new();
    let mut pending: Option<Line> = None;

    for (i, raw) in text.lines().enumerate() {
        let number = i + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(bad) = raw.chars().find(|c| !matches!(c, ' '..='~' | '\t')) {
            return Err(parse_err(
                number,
                format!("non-ASCII character {:?} in service definition", bad),
            ));
        }
        let mut line = match pending.take() {
            Some(mut joined) => {
                joined.text.push_str(raw);
                joined
            }
            None => Line {
                number,
                text: raw.to_string(),
            },
        };
        if let Some(stripped) = line.text.strip_suffix('\\') {
            // Continuation: the backslash becomes a space and the next
            // physical line is appended.
            line.text = format!("{} ", stripped);
            pending = Some(line);
            continue;
        }
        push_line(&mut out, line);
    }
    if let Some(line) = pending {
        push_line(&mut out, line);
    }
    Ok(out)
}

fn push_line(out: &mut Vec<Line>, mut line: Line) {
    line.text = line.text.trim().to_string();
    if line.text.is_empty() || line.text.starts_with('#') {
        return;
    }
    out.push(line);
}

/// First whitespace-delimited token and the trimmed remainder.
fn split_keyword(text: &str) -> (&str, &str) {
    match text.split_once(|c: char| c.is_ascii_whitespace()) {
        Some((kw, rest)) => (kw, rest.trim()),
        None => (text, ""),
    }
}

/// Expect `text` to be exactly one token.
fn single_token<'a>(text: &'a str, line: &Line, what: &str) -> Result<&'a str> {
    if text.is_empty() || text.contains(|c: char| c.is_ascii_whitespace()) {
        return Err(parse_err(
            line.number,
            format!("invalid {} declaration: '{}'", what, line.text),
        ));
    }
    Ok(text)
}

// ============================================================================
// Definition parsing
// ============================================================================

/// Relative order rank of each top-level construct.
fn construct_rank(keyword: &str) -> Option<u8> {
    match keyword {
        "stdver" => Some(1),
        "import" => Some(2),
        "using" => Some(3),
        "exception" | "constant" | "enum" => Some(4),
        "struct" | "pod" | "namedarray" | "object" => Some(5),
        _ => None,
    }
}

pub(crate) fn parse_definition(
    text: &str,
    warnings: &mut Vec<String>,
) -> Result<ServiceDefinition> {
    let lines = logical_lines(text)?;
    if lines.is_empty() {
        return Err(parse_err(1, "service definition is empty"));
    }

    let mut def = ServiceDefinition::default();

    // The first logical line must declare the service name.
    let first = &lines[0];
    let (kw, rest) = split_keyword(&first.text);
    if kw != "service" {
        return Err(parse_err(
            first.number,
            "service definition must begin with the 'service' keyword",
        ));
    }
    def.name = single_token(rest, first, "service")?.to_string();

    let mut reached: u8 = 1;
    let mut i = 1;
    while i < lines.len() {
        let line = &lines[i];
        let (kw, rest) = split_keyword(&line.text);

        if kw == "option" {
            warnings.push(format!(
                "line {}: 'option' keyword is deprecated",
                line.number
            ));
            def.options.push(rest.to_string());
            i += 1;
            continue;
        }

        if kw == "service" {
            return Err(parse_err(line.number, "duplicate 'service' declaration"));
        }

        let rank = construct_rank(kw)
            .ok_or_else(|| parse_err(line.number, format!("unknown keyword '{}'", kw)))?;
        if rank < reached {
            return Err(parse_err(
                line.number,
                format!("'{}' declaration out of order", kw),
            ));
        }
        reached = rank;

        match kw {
            "stdver" => {
                let v: StdVer = single_token(rest, line, "stdver")?
                    .parse()
                    .map_err(|_| parse_err(line.number, format!("invalid stdver: '{}'", rest)))?;
                def.stdver = Some(v);
                // Only imports and later constructs may follow.
                reached = 2;
            }
            "import" => {
                def.imports
                    .push(single_token(rest, line, "import")?.to_string());
            }
            "using" => def.usings.push(parse_using(rest, line)?),
            "exception" => {
                def.exceptions
                    .push(single_token(rest, line, "exception")?.to_string());
            }
            "constant" => def.constants.push(parse_constant(rest, line)?),
            "enum" => {
                let name = single_token(rest, line, "enum")?.to_string();
                let (body, next) = collect_block(&lines, i, kw, &name)?;
                def.enums.push(parse_enum(&name, line, body)?);
                i = next;
                continue;
            }
            "struct" | "pod" | "namedarray" | "object" => {
                let entry_kind = match kw {
                    "struct" => EntryKind::Structure,
                    "pod" => EntryKind::Pod,
                    "namedarray" => EntryKind::NamedArray,
                    _ => EntryKind::Object,
                };
                let name = single_token(rest, line, kw)?.to_string();
                let (body, next) = collect_block(&lines, i, kw, &name)?;
                let entry = parse_entry(&name, entry_kind, body, warnings)?;
                match entry_kind {
                    EntryKind::Structure => def.structures.push(entry),
                    EntryKind::Pod => def.pods.push(entry),
                    EntryKind::NamedArray => def.namedarrays.push(entry),
                    EntryKind::Object => def.objects.push(entry),
                }
                i = next;
                continue;
            }
            _ => unreachable!("rank filtered keyword '{}'", kw),
        }
        i += 1;
    }

    Ok(def)
}

/// Collect the body lines of the block starting at `start`, consuming the
/// matching `end`. Returns the body and the index after the `end` line.
fn collect_block<'a>(
    lines: &'a [Line],
    start: usize,
    keyword: &str,
    name: &str,
) -> Result<(&'a [Line], usize)> {
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        let (kw, rest) = split_keyword(&line.text);
        if kw != "end" {
            continue;
        }
        if !rest.is_empty() && rest != keyword {
            return Err(parse_err(
                line.number,
                format!("mismatched 'end {}' closing {} '{}'", rest, keyword, name),
            ));
        }
        return Ok((&lines[start + 1..j], j + 1));
    }
    Err(parse_err(
        lines[start].number,
        format!("missing 'end' for {} '{}'", keyword, name),
    ))
}

fn parse_using(rest: &str, line: &Line) -> Result<UsingDefinition> {
    let tokens: Vec<&str> = rest.split_ascii_whitespace().collect();
    match tokens.as_slice() {
        [qualified] => Ok(UsingDefinition {
            qualified: (*qualified).to_string(),
            alias: UsingDefinition::default_alias(qualified).to_string(),
        }),
        [qualified, "as", alias] => Ok(UsingDefinition {
            qualified: (*qualified).to_string(),
            alias: (*alias).to_string(),
        }),
        _ => Err(parse_err(
            line.number,
            format!("invalid using declaration: '{}'", line.text),
        )),
    }
}

fn parse_constant(rest: &str, line: &Line) -> Result<ConstantDefinition> {
    let (type_token, rest) = split_keyword(rest);
    let (name, value) = split_keyword(rest);
    if type_token.is_empty() || name.is_empty() || value.is_empty() {
        return Err(parse_err(
            line.number,
            format!("invalid constant declaration: '{}'", line.text),
        ));
    }
    let type_def = parse_type_token(type_token, "").map_err(|e| parse_err(line.number, e))?;
    Ok(ConstantDefinition {
        name: name.to_string(),
        type_def,
        value: value.to_string(),
    })
}

// ============================================================================
// Enum parsing
// ============================================================================

fn parse_enum(name: &str, start: &Line, body: &[Line]) -> Result<EnumDefinition> {
    let mut joined = String::new();
    for line in body {
        joined.push_str(&line.text);
    }
    let mut values: Vec<EnumValueDefinition> = Vec::new();
    if joined.trim().is_empty() {
        return Err(parse_err(start.number, format!("enum '{}' is empty", name)));
    }
    for piece in joined.split(',') {
        let piece = piece.trim();
        let value = parse_enum_value(piece, values.last().map(|v| v.value))
            .map_err(|e| parse_err(start.number, e))?;
        values.push(value);
    }
    Ok(EnumDefinition {
        name: name.to_string(),
        values,
    })
}

fn parse_enum_value(
    text: &str,
    previous: Option<i64>,
) -> std::result::Result<EnumValueDefinition, String> {
    if text.is_empty() {
        return Err("expected enum value".to_string());
    }
    let (name, literal) = match text.split_once('=') {
        Some((n, l)) => (n.trim(), Some(l.trim())),
        None => (text, None),
    };
    if name.is_empty() || name.contains(|c: char| c.is_ascii_whitespace()) {
        return Err(format!("invalid enum value: '{}'", text));
    }
    match literal {
        None => {
            let value = match previous {
                Some(p) => p
                    .checked_add(1)
                    .ok_or_else(|| format!("enum value overflow after '{}'", name))?,
                None => 0,
            };
            Ok(EnumValueDefinition {
                name: name.to_string(),
                value,
                implicit_value: true,
                hex_value: false,
            })
        }
        Some(literal) => {
            let (negative, digits) = match literal.strip_prefix('-') {
                Some(d) => (true, d),
                None => (false, literal),
            };
            let (hex, value) = if let Some(h) =
                digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
            {
                (
                    true,
                    i64::from_str_radix(h, 16)
                        .map_err(|_| format!("invalid enum value: '{}'", text))?,
                )
            } else {
                (
                    false,
                    digits
                        .parse::<i64>()
                        .map_err(|_| format!("invalid enum value: '{}'", text))?,
                )
            };
            Ok(EnumValueDefinition {
                name: name.to_string(),
                value: if negative { -value } else { value },
                implicit_value: false,
                hex_value: hex,
            })
        }
    }
}

// ============================================================================
// Entry parsing
// ============================================================================

fn parse_entry(
    name: &str,
    entry_kind: EntryKind,
    body: &[Line],
    warnings: &mut Vec<String>,
) -> Result<ServiceEntryDefinition> {
    let mut entry = ServiceEntryDefinition::new(name, entry_kind);
    for line in body {
        let (kw, rest) = split_keyword(&line.text);
        match kw {
            "option" => {
                warnings.push(format!(
                    "line {}: 'option' keyword is deprecated",
                    line.number
                ));
                entry.options.push(rest.to_string());
            }
            "constant" => entry.constants.push(parse_constant(rest, line)?),
            "implements" => {
                if entry_kind != EntryKind::Object {
                    return Err(parse_err(
                        line.number,
                        format!(
                            "'implements' is not valid inside a {} block",
                            entry_kind.keyword()
                        ),
                    ));
                }
                entry
                    .implements
                    .push(single_token(rest, line, "implements")?.to_string());
            }
            _ => entry.members.push(parse_member(entry_kind, line)?),
        }
    }
    Ok(entry)
}

const OBJECT_MEMBER_KEYWORDS: &[&str] = &[
    "property", "function", "event", "objref", "pipe", "callback", "wire", "memory",
];

fn parse_member<'a>(entry_kind: EntryKind, line: &'a Line) -> Result<MemberDefinition> {
    let parsed = split_member_line(&line.text).map_err(|e| parse_err(line.number, e))?;

    if entry_kind == EntryKind::Object {
        if !OBJECT_MEMBER_KEYWORDS.contains(&parsed.keyword) {
            return Err(parse_err(
                line.number,
                format!("'{}' is not valid inside an object block", parsed.keyword),
            ));
        }
    } else if parsed.keyword != "field" {
        return Err(parse_err(
            line.number,
            format!(
                "'{}' is not valid inside a {} block",
                parsed.keyword,
                entry_kind.keyword()
            ),
        ));
    }

    let wrap_type =
        |token: &str| parse_type_token(token, "").map_err(|e| parse_err(line.number, e));

    let require_type = |member: &MemberLine<'a>| -> Result<&'a str> {
        member.type_token.ok_or_else(|| {
            parse_err(
                line.number,
                format!("'{}' member requires a data type", member.keyword),
            )
        })
    };
    let forbid_params = |member: &MemberLine<'_>| {
        if member.params.is_some() {
            return Err(parse_err(
                line.number,
                format!("'{}' member cannot take parameters", member.keyword),
            ));
        }
        Ok(())
    };
    let require_params = |member: &MemberLine<'a>| -> Result<&'a str> {
        member.params.ok_or_else(|| {
            parse_err(
                line.number,
                format!("'{}' member requires a parameter list", member.keyword),
            )
        })
    };

    let member = match parsed.keyword {
        "property" | "field" => {
            forbid_params(&parsed)?;
            MemberDefinition::Property(PropertyDefinition {
                name: parsed.name.to_string(),
                type_def: wrap_type(require_type(&parsed)?)?,
                modifiers: parsed.modifiers,
            })
        }
        "function" => MemberDefinition::Function(FunctionDefinition {
            name: parsed.name.to_string(),
            return_type: wrap_type(require_type(&parsed)?)?,
            params: parse_params(require_params(&parsed)?, line)?,
            modifiers: parsed.modifiers,
        }),
        "event" => {
            if parsed.type_token.is_some() {
                return Err(parse_err(
                    line.number,
                    "'event' member does not declare a data type",
                ));
            }
            MemberDefinition::Event(EventDefinition {
                name: parsed.name.to_string(),
                params: parse_params(require_params(&parsed)?, line)?,
                modifiers: parsed.modifiers,
            })
        }
        "objref" => {
            forbid_params(&parsed)?;
            let (object_type, index) = parse_objref_type(require_type(&parsed)?)
                .map_err(|e| parse_err(line.number, e))?;
            MemberDefinition::ObjRef(ObjRefDefinition {
                name: parsed.name.to_string(),
                object_type,
                index,
                modifiers: parsed.modifiers,
            })
        }
        "pipe" => {
            forbid_params(&parsed)?;
            MemberDefinition::Pipe(PipeDefinition {
                name: parsed.name.to_string(),
                type_def: wrap_type(require_type(&parsed)?)?,
                modifiers: parsed.modifiers,
            })
        }
        "callback" => MemberDefinition::Callback(CallbackDefinition {
            name: parsed.name.to_string(),
            return_type: wrap_type(require_type(&parsed)?)?,
            params: parse_params(require_params(&parsed)?, line)?,
            modifiers: parsed.modifiers,
        }),
        "wire" => {
            forbid_params(&parsed)?;
            MemberDefinition::Wire(WireDefinition {
                name: parsed.name.to_string(),
                type_def: wrap_type(require_type(&parsed)?)?,
                modifiers: parsed.modifiers,
            })
        }
        "memory" => {
            forbid_params(&parsed)?;
            MemberDefinition::Memory(MemoryDefinition {
                name: parsed.name.to_string(),
                type_def: wrap_type(require_type(&parsed)?)?,
                modifiers: parsed.modifiers,
            })
        }
        other => {
            return Err(parse_err(line.number, format!("unknown keyword '{}'", other)));
        }
    };
    Ok(member)
}

/// Generalized member line: keyword, optional datatype token, name, optional
/// parenthesized parameters, optional trailing bracketed modifiers.
#[derive(Debug)]
struct MemberLine<'a> {
    keyword: &'a str,
    type_token: Option<&'a str>,
    name: &'a str,
    params: Option<&'a str>,
    modifiers: Vec<String>,
}

fn split_member_line(text: &str) -> std::result::Result<MemberLine<'_>, String> {
    let mut rest = text.trim();

    // Trailing modifier list: a space-separated final [a,b,c] group.
    let mut modifiers = Vec::new();
    if rest.ends_with(']') {
        if let Some(idx) = rest.rfind(" [") {
            let group = rest[idx + 1..].trim();
            let body = &group[1..group.len() - 1];
            let parts: Vec<&str> = body.split(',').map(str::trim).collect();
            if !parts.is_empty() && parts.iter().all(|p| !p.is_empty()) {
                modifiers = parts.iter().map(|p| (*p).to_string()).collect();
                rest = rest[..idx].trim_end();
            }
        }
    }

    // Parameter list.
    let params = match rest.find('(') {
        Some(open) => {
            let close = rest
                .rfind(')')
                .filter(|c| *c > open && rest[*c + 1..].trim().is_empty())
                .ok_or_else(|| format!("unbalanced parameter list in '{}'", text))?;
            let p = &rest[open + 1..close];
            rest = rest[..open].trim_end();
            Some(p)
        }
        None => None,
    };

    let tokens: Vec<&str> = rest.split_ascii_whitespace().collect();
    let (keyword, type_token, name) = match tokens.as_slice() {
        [kw, name] => (*kw, None, *name),
        [kw, t, name] => (*kw, Some(*t), *name),
        _ => return Err(format!("invalid member declaration: '{}'", text)),
    };
    Ok(MemberLine {
        keyword,
        type_token,
        name,
        params,
        modifiers,
    })
}

/// Split a parameter list on commas that are not nested inside `[]` or `{}`.
fn split_params(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

fn parse_params(text: &str, line: &Line) -> Result<Vec<TypeDefinition>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let mut params = Vec::new();
    for piece in split_params(text) {
        let tokens: Vec<&str> = piece.split_ascii_whitespace().collect();
        let [type_token, name] = tokens.as_slice() else {
            return Err(parse_err(
                line.number,
                format!("invalid parameter declaration: '{}'", piece.trim()),
            ));
        };
        let param = parse_type_token(type_token, name).map_err(|e| parse_err(line.number, e))?;
        params.push(param);
    }
    Ok(params)
}

fn parse_objref_type(token: &str) -> std::result::Result<(String, ObjRefIndex), String> {
    if let Some(base) = token.strip_suffix("[]") {
        return Ok((base.to_string(), ObjRefIndex::Array));
    }
    if let Some(base) = token.strip_suffix("{int32}") {
        return Ok((base.to_string(), ObjRefIndex::MapInt32));
    }
    if let Some(base) = token.strip_suffix("{string}") {
        return Ok((base.to_string(), ObjRefIndex::MapString));
    }
    if token.contains('[') || token.contains('{') {
        return Err(format!("invalid objref type: '{}'", token));
    }
    Ok((token.to_string(), ObjRefIndex::None))
}

// ============================================================================
// Type token parsing
// ============================================================================

/// Parse one type token of the form `base[array]{container}`.
pub(crate) fn parse_type_token(
    token: &str,
    name: &str,
) -> std::result::Result<TypeDefinition, String> {
    let (base_and_array, container) = match token.find('{') {
        Some(idx) => {
            let c = &token[idx..];
            if !c.ends_with('}') {
                return Err(format!("invalid type: '{}'", token));
            }
            (&token[..idx], Some(&c[1..c.len() - 1]))
        }
        None => (token, None),
    };
    let (base, array) = match base_and_array.find('[') {
        Some(idx) => {
            let a = &base_and_array[idx..];
            if !a.ends_with(']') {
                return Err(format!("invalid type: '{}'", token));
            }
            (&base_and_array[..idx], Some(&a[1..a.len() - 1]))
        }
        None => (base_and_array, None),
    };

    if base.is_empty()
        || !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        || !base.starts_with(|c: char| c.is_ascii_alphabetic())
    {
        return Err(format!("invalid type name: '{}'", token));
    }

    let data_type =
        DataType::from_keyword(base).unwrap_or_else(|| DataType::Named(base.to_string()));

    let array = match array {
        None => ArrayShape::None,
        Some(body) => parse_array_shape(body).map_err(|_| format!("invalid array: '{}'", token))?,
    };

    let container = match container {
        None => ContainerKind::None,
        Some("list") => ContainerKind::List,
        Some("int32") => ContainerKind::MapInt32,
        Some("string") => ContainerKind::MapString,
        Some("generator") => ContainerKind::Generator,
        Some(other) => return Err(format!("invalid container type: '{{{}}}'", other)),
    };

    let mut td = TypeDefinition::new(data_type);
    td.name = name.to_string();
    td.array = array;
    td.container = container;
    Ok(td)
}

fn parse_array_shape(body: &str) -> std::result::Result<ArrayShape, ()> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(ArrayShape::Variable);
    }
    if body == "*" {
        return Ok(ArrayShape::VariableMultiDim);
    }
    if body.contains(',') {
        let mut dims = Vec::new();
        for piece in body.split(',') {
            dims.push(piece.trim().parse::<u32>().map_err(|_| ())?);
        }
        return Ok(ArrayShape::FixedMultiDim(dims));
    }
    if let Some(bound) = body.strip_suffix('-') {
        return Ok(ArrayShape::Bounded(bound.trim().parse().map_err(|_| ())?));
    }
    Ok(ArrayShape::Fixed(body.parse().map_err(|_| ())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ServiceDefinition {
        ServiceDefinition::from_string(text).unwrap()
    }

    fn parse_error(text: &str) -> (usize, String) {
        match ServiceDefinition::from_string(text) {
            Err(Error::Parse { line, message }) => (line, message),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn minimal_definition_parses() {
        let def = parse("service TestService\n\nobject Foo\n    property int32 x\nend\n");
        assert_eq!(def.name, "TestService");
        assert_eq!(def.objects.len(), 1);
        let obj = &def.objects[0];
        assert_eq!(obj.name, "Foo");
        assert_eq!(obj.members.len(), 1);
        match &obj.members[0] {
            MemberDefinition::Property(p) => {
                assert_eq!(p.name, "x");
                assert_eq!(p.type_def.data_type, DataType::Int32);
            }
            other => panic!("unexpected member: {:?}", other),
        }
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let def = parse(
            "# leading comment\nservice example.commented\n\n  # indented comment\nstdver 0.9\n",
        );
        assert_eq!(def.name, "example.commented");
        assert_eq!(def.stdver, Some(StdVer::new(0, 9)));
    }

    #[test]
    fn backslash_joins_physical_lines() {
        let def = parse(
            "service example.cont\n\nobject Foo\nfunction void add(int32 a, \\\nint32 b)\nend\n",
        );
        let obj = &def.objects[0];
        match &obj.members[0] {
            MemberDefinition::Function(func) => {
                assert_eq!(func.params.len(), 2);
                assert_eq!(func.params[1].name, "b");
            }
            other => panic!("unexpected member: {:?}", other),
        }
    }

    #[test]
    fn error_line_numbers_account_for_continuations() {
        let (line, _) = parse_error("service example.a\n\nobject Foo\nbroken \\\nline here\nend\n");
        assert_eq!(line, 4);
    }

    #[test]
    fn non_ascii_is_rejected_with_line() {
        let (line, message) = parse_error("service example.a\n# caf\u{e9}\n");
        assert_eq!(line, 2);
        assert!(message.contains("non-ASCII"));
    }

    #[test]
    fn out_of_order_constructs_are_rejected() {
        let (_, message) = parse_error("service a.b\nimport c.d\nstdver 0.9\n");
        assert!(message.contains("out of order"), "{}", message);
        let (_, message) =
            parse_error("service a.b\nstruct S\nfield int32 x\nend\nconstant int32 c 1\n");
        assert!(message.contains("out of order"), "{}", message);
        let (_, message) = parse_error("service a.b\nusing c.d.E\nimport c.d\n");
        assert!(message.contains("out of order"), "{}", message);
    }

    #[test]
    fn first_line_must_declare_service() {
        let (_, message) = parse_error("stdver 0.9\nservice a.b\n");
        assert!(message.contains("'service'"));
    }

    #[test]
    fn option_is_allowed_anywhere_and_warns() {
        let mut warnings = Vec::new();
        let def = ServiceDefinition::from_string_with_warnings(
            "service a.b\nstdver 0.9\nimport c.d\noption extra flag\n\nstruct S\nfield int32 x\nend\noption late\n",
            &mut warnings,
        )
        .unwrap();
        assert_eq!(def.options, vec!["extra flag".to_string(), "late".to_string()]);
        assert!(warnings.iter().any(|w| w.contains("deprecated")));
    }

    #[test]
    fn missing_stdver_does_not_warn() {
        let mut warnings = Vec::new();
        let def =
            ServiceDefinition::from_string_with_warnings("service a.b\n", &mut warnings).unwrap();
        assert!(def.declared_version().is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn block_without_end_reports_start_line() {
        let (line, message) = parse_error("service a.b\n\nstruct S\nfield int32 x\n");
        assert_eq!(line, 3);
        assert!(message.contains("missing 'end'"));
    }

    #[test]
    fn qualified_end_must_match_block_keyword() {
        let (line, message) =
            parse_error("service a.b\n\nstruct S\nfield int32 x\nend object\n");
        assert_eq!(line, 5);
        assert!(message.contains("mismatched"));
        parse("service a.b\n\nstruct S\nfield int32 x\nend struct\n");
    }

    #[test]
    fn full_member_set_parses() {
        let def = parse(concat!(
            "service example.robot\n",
            "stdver 0.9\n",
            "\n",
            "object Robot\n",
            "property double[3] position [readonly]\n",
            "function double{generator} sample(int32 rate)\n",
            "event moved(double[3] delta)\n",
            "objref Tool{string} tools\n",
            "pipe double[6] state [readonly,unreliable]\n",
            "callback int32 notify(string message)\n",
            "wire uint8 heartbeat [writeonly]\n",
            "memory double[] trace [readonly]\n",
            "end\n",
            "\n",
            "object Tool\n",
            "property bool engaged\n",
            "end\n",
        ));
        let robot = &def.objects[0];
        assert_eq!(robot.members.len(), 8);
        match robot.get_member("position") {
            Some(MemberDefinition::Property(p)) => {
                assert_eq!(p.type_def.array, ArrayShape::Fixed(3));
                assert_eq!(p.modifiers, vec!["readonly".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        match robot.get_member("sample") {
            Some(MemberDefinition::Function(func)) => {
                assert!(func.is_generator());
                assert_eq!(func.params.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
        match robot.get_member("tools") {
            Some(MemberDefinition::ObjRef(o)) => {
                assert_eq!(o.object_type, "Tool");
                assert_eq!(o.index, ObjRefIndex::MapString);
            }
            other => panic!("unexpected: {:?}", other),
        }
        match robot.get_member("state") {
            Some(MemberDefinition::Pipe(p)) => {
                assert!(p.is_unreliable());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn struct_bodies_take_fields_only() {
        let (_, message) =
            parse_error("service a.b\n\nstruct S\nproperty int32 x\nend\n");
        assert!(message.contains("not valid inside a struct"));
        let (_, message) = parse_error("service a.b\n\npod P\nimplements Q\nend\n");
        assert!(message.contains("implements"));
    }

    #[test]
    fn object_rejects_field_keyword() {
        let (_, message) = parse_error("service a.b\n\nobject O\nfield int32 x\nend\n");
        assert!(message.contains("not valid inside an object"));
    }

    #[test]
    fn enum_forms_parse() {
        let def = parse(
            "service a.b\nstdver 0.9\n\nenum mode\noff = 0,\nfast = 0x10,\nslow,\nreverse = -2,\nlast\nend\n",
        );
        let e = &def.enums[0];
        let values: Vec<(String, i64)> = e
            .values
            .iter()
            .map(|v| (v.name.clone(), v.value))
            .collect();
        assert_eq!(
            values,
            vec![
                ("off".to_string(), 0),
                ("fast".to_string(), 16),
                ("slow".to_string(), 17),
                ("reverse".to_string(), -2),
                ("last".to_string(), -1),
            ]
        );
        assert!(e.values[2].implicit_value);
        assert!(e.values[1].hex_value);
    }

    #[test]
    fn empty_enum_is_rejected() {
        let (_, message) = parse_error("service a.b\nstdver 0.9\n\nenum mode\nend\n");
        assert!(message.contains("empty"));
    }

    #[test]
    fn constants_parse_at_both_levels() {
        let def = parse(concat!(
            "service a.b\n",
            "stdver 0.9\n",
            "constant uint32 answer 42\n",
            "constant double[] gains {1.0, 2.0}\n",
            "constant string greeting \"hello\\nworld\"\n",
            "\n",
            "struct S\n",
            "constant int32 inner -7\n",
            "field int32 x\n",
            "end\n",
        ));
        assert_eq!(def.constants.len(), 3);
        assert_eq!(
            def.find_constant("greeting").unwrap().value_to_string().unwrap(),
            "hello\nworld"
        );
        assert_eq!(def.structures[0].constants.len(), 1);
    }

    #[test]
    fn using_with_and_without_alias() {
        let def = parse("service a.b\nstdver 0.9\nimport c.d\nusing c.d.E\nusing c.d.F as G\n");
        assert_eq!(def.usings[0].alias, "E");
        assert_eq!(def.usings[1].alias, "G");
        let (_, message) = parse_error("service a.b\nusing c.d.E as\n");
        assert!(message.contains("using"));
    }

    #[test]
    fn type_tokens_parse_all_shapes() {
        let t = parse_type_token("int32", "").unwrap();
        assert_eq!(t.array, ArrayShape::None);
        assert_eq!(parse_type_token("int32[]", "").unwrap().array, ArrayShape::Variable);
        assert_eq!(parse_type_token("int32[8]", "").unwrap().array, ArrayShape::Fixed(8));
        assert_eq!(parse_type_token("int32[8-]", "").unwrap().array, ArrayShape::Bounded(8));
        assert_eq!(
            parse_type_token("int32[2,3]", "").unwrap().array,
            ArrayShape::FixedMultiDim(vec![2, 3])
        );
        assert_eq!(
            parse_type_token("int32[*]", "").unwrap().array,
            ArrayShape::VariableMultiDim
        );
        let t = parse_type_token("example.other.Bar{string}", "").unwrap();
        assert_eq!(t.data_type, DataType::Named("example.other.Bar".to_string()));
        assert_eq!(t.container, ContainerKind::MapString);
        assert!(parse_type_token("int32[2,-3]", "").is_err());
        assert!(parse_type_token("int32{set}", "").is_err());
        assert!(parse_type_token("3bad", "").is_err());
        assert!(parse_type_token("int32[", "").is_err());
    }

    #[test]
    fn definition_round_trips_through_display() {
        let text = concat!(
            "service example.rt\n",
            "stdver 0.9\n",
            "import example.other\n",
            "using example.other.Base\n",
            "exception OutOfCheese\n",
            "constant int32 limit 10\n",
            "\n",
            "enum mode\n",
            "idle = 0,\n",
            "busy\n",
            "end\n",
            "\n",
            "struct Sample\n",
            "field double[3] value\n",
            "end\n",
            "\n",
            "object Thing\n",
            "implements Base\n",
            "property Sample latest\n",
            "function void reset()\n",
            "end\n",
        );
        let def = parse(text);
        let printed = def.to_string();
        let reparsed = parse(&printed);
        assert!(crate::robdef::ast::compare_service_definitions(&def, &reparsed));
    }
}
