//! Hand-written recursive-descent tokenizer.
//!
//! Every grammar production follows the same contract: it consumes a
//! matching prefix and returns a node, advancing the cursor, or reports
//! no-match leaving the cursor untouched. Failure never consumes partially.
//!
//! A value expression tries the productions in a fixed priority order and
//! the first success wins (ordered choice, not longest match). A postfix
//! loop then greedily applies member access, calls, indexing, `is`/`as`
//! and assignment. Top-level assembly tries null-coalescing and ternary
//! forms over the whole input first, then runs a flat left-to-right scan
//! folded by minimal precedence.

use std::sync::Arc;

use ecow::EcoString;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use tracing::debug;

use super::error::ParseError;
use super::token::{ParamKind, Token};
use crate::diagnostics::{self, Event};
use crate::ops::{Operator, BINARY_OPERATORS};
use crate::registry;
use crate::types::TypeRef;
use crate::values::Value;

/// Tokenizes an expression into a token tree.
///
/// Publishes a tokenize-success or tokenize-failure event before
/// returning. Failure is terminal: the expression text is wrong, not the
/// values it will be applied to.
pub fn tokenize(expression: &str) -> Result<Token, ParseError> {
    match try_expression(expression) {
        Ok(Some(token)) => {
            diagnostics::publish(&Event::TokenizeSuccess {
                expression: expression.to_string(),
                tree: token.debug_view(),
            });
            Ok(token)
        }
        Ok(None) => {
            debug!(expression, "failed to tokenize");
            diagnostics::publish(&Event::TokenizeFailure {
                expression: expression.to_string(),
            });
            Err(ParseError::FailedToTokenize {
                expression: expression.to_string(),
            })
        }
        Err(err) => {
            debug!(expression, error = %err, "failed to tokenize");
            diagnostics::publish(&Event::TokenizeFailure {
                expression: expression.to_string(),
            });
            Err(err)
        }
    }
}

/// Parses a complete expression; the whole input must be consumed.
pub(crate) fn try_expression(text: &str) -> Result<Option<Token>, ParseError> {
    // Whole-expression alternatives first: `??` and `?:` are
    // right-associative and short-circuit, which the flat scan cannot
    // express.
    if let Some(token) = try_null_coalesce(text)? {
        return Ok(Some(token));
    }
    if let Some(token) = try_ternary(text)? {
        return Ok(Some(token));
    }

    let mut rest = text;
    let mut tokens: SmallVec<[Token; 4]> = SmallVec::new();
    let mut operators: SmallVec<[Operator; 4]> = SmallVec::new();

    // Flat scan: value, operator, value, operator, ...
    loop {
        let Some(token) = try_value_token(&mut rest)? else {
            return Ok(None);
        };
        tokens.push(token);
        skip_ws(&mut rest);
        let mut matched = false;
        for op in BINARY_OPERATORS {
            let Some(symbol) = op.symbol() else { continue };
            if rest.starts_with(symbol) {
                operators.push(op);
                rest = &rest[symbol.len()..];
                matched = true;
                break;
            }
        }
        if !matched {
            break;
        }
    }
    if !rest.trim().is_empty() {
        return Ok(None);
    }

    // Fold the left-most minimal-precedence operator until one node
    // remains.
    while tokens.len() > 1 {
        let mut last_precedence = u8::MAX;
        let mut last = 0;
        for (i, op) in operators.iter().enumerate() {
            let precedence = op.precedence();
            if precedence < last_precedence {
                last_precedence = precedence;
                last = i;
            } else {
                break;
            }
        }
        let right = tokens.remove(last + 1);
        let left = tokens.remove(last);
        let op = operators.remove(last);
        tokens.insert(
            last,
            Token::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        );
    }
    Ok(tokens.pop())
}

fn try_null_coalesce(text: &str) -> Result<Option<Token>, ParseError> {
    let Some(pos) = scan_top_level(text, |rest| rest.starts_with("??")) else {
        return Ok(None);
    };
    let Some(left) = try_expression(&text[..pos])? else {
        return Ok(None);
    };
    let Some(right) = try_expression(&text[pos + 2..])? else {
        return Ok(None);
    };
    Ok(Some(Token::NullCoalesce {
        left: Box::new(left),
        right: Box::new(right),
    }))
}

fn try_ternary(text: &str) -> Result<Option<Token>, ParseError> {
    let Some((question, colon)) = split_ternary(text) else {
        return Ok(None);
    };
    let Some(condition) = try_expression(&text[..question])? else {
        return Ok(None);
    };
    let Some(if_true) = try_expression(&text[question + 1..colon])? else {
        return Ok(None);
    };
    let Some(if_false) = try_expression(&text[colon + 1..])? else {
        return Ok(None);
    };
    Ok(Some(Token::Ternary {
        condition: Box::new(condition),
        if_true: Box::new(if_true),
        if_false: Box::new(if_false),
    }))
}

/// Parses one value with its postfix chain.
///
/// Ordered choice over the value productions, then the greedy postfix
/// loop. A node with at least one postfix application is wrapped in a
/// chain marker so null-propagating accesses can short-circuit it.
pub(crate) fn try_value_token(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let mut probe = *text;
    skip_ws(&mut probe);

    type ValueParser = fn(&mut &str) -> Result<Option<Token>, ParseError>;
    const VALUE_PARSERS: [ValueParser; 11] = [
        try_static_call,
        try_constructor,
        try_static_member,
        try_parameter,
        try_constant,
        try_unary,
        try_lambda,
        try_bracketed,
        try_cast,
        try_typeof,
        try_throw,
    ];

    let mut token = None;
    for parser in VALUE_PARSERS {
        if let Some(parsed) = parser(&mut probe)? {
            token = Some(parsed);
            break;
        }
    }
    let Some(mut token) = token else {
        return Ok(None);
    };

    let mut had_post = false;
    loop {
        let mut post_probe = probe;
        skip_ws(&mut post_probe);
        match try_post_op(&mut post_probe, token)? {
            Ok(new_token) => {
                token = new_token;
                probe = post_probe;
                had_post = true;
            }
            Err(returned) => {
                token = returned;
                break;
            }
        }
    }
    if had_post {
        token = Token::Chain {
            target: Box::new(token),
        };
    }

    *text = probe;
    Ok(Some(token))
}

/// Applies one postfix production to `target`. `Ok(token)` advances the
/// cursor; `Err(target)` hands the target back untouched when nothing
/// matched (or a textual match rejected the target, like assignment to a
/// non-assignable node).
fn try_post_op(
    text: &mut &str,
    target: Token,
) -> Result<std::result::Result<Token, Token>, ParseError> {
    let s = *text;

    // Null-propagating access: consume the `?` of `?.`, the member access
    // itself parses on the next round.
    if s.starts_with("?.") {
        *text = &s[1..];
        return Ok(Ok(Token::NullPropagate {
            target: Box::new(target),
        }));
    }

    // Instance member access or call.
    if let Some(rest) = s.strip_prefix('.') {
        let mut probe = rest;
        if let Some(name) = take_ident(&mut probe) {
            // Optional explicit type arguments, only kept when a call
            // follows: `.name<T>(..)`.
            let mut type_args = Vec::new();
            let mut call_probe = probe;
            if call_probe.starts_with('<') {
                if let Some(args) = try_type_args(&mut call_probe)? {
                    if call_probe.starts_with('(') {
                        type_args = args;
                    } else {
                        call_probe = probe;
                    }
                } else {
                    call_probe = probe;
                }
            }
            if let Some(args) = try_argument_list(&mut call_probe, '(', ')')? {
                *text = call_probe;
                return Ok(Ok(Token::InstanceCall {
                    target: Box::new(target),
                    name: name.into(),
                    type_args,
                    args,
                }));
            }
            *text = probe;
            return Ok(Ok(Token::InstanceMember {
                target: Box::new(target),
                name: name.into(),
            }));
        }
    }

    // Indexer access.
    if s.starts_with('[') {
        let mut probe = s;
        if let Some(args) = try_argument_list(&mut probe, '[', ']')? {
            if !args.is_empty() {
                *text = probe;
                return Ok(Ok(Token::Index {
                    target: Box::new(target),
                    args,
                }));
            }
        }
    }

    // `is Type` / `as Type`.
    for (keyword, is_check) in [("is", true), ("as", false)] {
        if let Some(mut probe) = strip_keyword(&s, keyword) {
            skip_ws(&mut probe);
            if let Some(ty) = try_type(&mut probe)? {
                *text = probe;
                let target = Box::new(target);
                return Ok(Ok(if is_check {
                    Token::Is { target, ty }
                } else {
                    Token::As { target, ty }
                }));
            }
        }
    }

    // Assignment; the right-hand side is the entire remaining expression.
    if s.starts_with('=') && !s.starts_with("==") {
        let rest = &s[1..];
        if let Some(value) = try_expression(rest)? {
            if !is_assignable(&target) {
                return Ok(Err(target));
            }
            *text = &rest[rest.len()..];
            return Ok(Ok(Token::Assign {
                target: Box::new(target),
                value: Box::new(value),
            }));
        }
    }

    Ok(Err(target))
}

fn is_assignable(target: &Token) -> bool {
    matches!(
        target,
        Token::Parameter {
            kind: ParamKind::Slot(_)
        } | Token::InstanceMember { .. }
            | Token::Index { .. }
    )
}

// ---------------------------------------------------------------------------
// Value productions, in priority order.
// ---------------------------------------------------------------------------

/// `Type.Method(args)`, optionally `Type.Method<T>(args)`.
fn try_static_call(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let mut probe = *text;
    let Some((segments, ends)) = peek_dotted(probe) else {
        return Ok(None);
    };
    if segments.len() < 2 {
        return Ok(None);
    }
    let name = segments[segments.len() - 1];
    let type_name = segments[..segments.len() - 1].join(".");
    probe = &probe[ends[segments.len() - 1]..];

    let mut type_args = Vec::new();
    if probe.starts_with('<') {
        let mut generic_probe = probe;
        if let Some(args) = try_type_args(&mut generic_probe)? {
            if generic_probe.starts_with('(') {
                type_args = args;
                probe = generic_probe;
            }
        }
    }
    let Some(args) = try_argument_list(&mut probe, '(', ')')? else {
        return Ok(None);
    };
    let Some(ty) = registry::global().resolve_type(&type_name, &[])? else {
        return Ok(None);
    };
    *text = probe;
    Ok(Some(Token::StaticCall {
        ty,
        name: name.into(),
        type_args,
        args,
    }))
}

/// `new Type(args)`.
fn try_constructor(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let Some(mut probe) = strip_keyword(text, "new") else {
        return Ok(None);
    };
    skip_ws(&mut probe);
    let Some(ty) = try_type(&mut probe)? else {
        return Ok(None);
    };
    skip_ws(&mut probe);
    let Some(args) = try_argument_list(&mut probe, '(', ')')? else {
        return Ok(None);
    };
    *text = probe;
    Ok(Some(Token::New { ty, args }))
}

/// `Type.Member`; the longest resolvable dotted prefix is the type, the
/// next segment the member, and anything further is left to the postfix
/// loop.
fn try_static_member(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let probe = *text;
    let Some((segments, ends)) = peek_dotted(probe) else {
        return Ok(None);
    };
    if segments.len() < 2 {
        return Ok(None);
    }
    for split in (1..segments.len()).rev() {
        let type_name = segments[..split].join(".");
        if let Some(ty) = registry::global().resolve_type(&type_name, &[])? {
            let name = segments[split];
            *text = &probe[ends[split]..];
            return Ok(Some(Token::StaticMember {
                ty,
                name: name.into(),
            }));
        }
    }
    Ok(None)
}

/// `$name`, `$V0`..`$V9`, `$P0`..`$P4`.
fn try_parameter(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    let Some(mut probe) = s.strip_prefix('$') else {
        return Ok(None);
    };
    let Some(name) = take_ident(&mut probe) else {
        return Ok(None);
    };
    let bytes = name.as_bytes();
    let kind = if bytes.len() == 2 && bytes[0] == b'V' && bytes[1].is_ascii_digit() {
        ParamKind::Slot(bytes[1] - b'0')
    } else if bytes.len() == 2 && bytes[0] == b'P' && (b'0'..=b'4').contains(&bytes[1]) {
        ParamKind::Side(bytes[1] - b'0')
    } else {
        ParamKind::Named(name.into())
    };
    *text = probe;
    Ok(Some(Token::Parameter { kind }))
}

/// Quoted, boolean, null, and numeric literals.
fn try_constant(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    if s.is_empty() {
        return Ok(None);
    }

    // Quoted literal: a single char followed by the `c` suffix is a char,
    // anything else a string. An escaped quote does not terminate.
    if let Some(token) = try_quoted(text)? {
        return Ok(Some(token));
    }

    // Keyword literals, case-insensitive.
    for (keyword, value) in [
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("null", Value::Null),
    ] {
        if s.len() >= keyword.len() && s[..keyword.len()].eq_ignore_ascii_case(keyword) {
            *text = &s[keyword.len()..];
            return Ok(Some(Token::Constant { value }));
        }
    }

    try_numeric(text)
}

fn try_quoted(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'\'') {
        return Ok(None);
    }
    let mut close = 1;
    while close < bytes.len() && !(bytes[close] == b'\'' && bytes[close - 1] != b'\\') {
        close += 1;
    }
    if close >= bytes.len() {
        return Ok(None);
    }
    let content = unescape(&s[1..close]);
    if bytes.get(close + 1) == Some(&b'c') {
        let mut chars = content.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(ParseError::InvalidCharLiteral {
                text: content.to_string(),
            });
        };
        *text = &s[close + 2..];
        return Ok(Some(Token::Constant {
            value: Value::Char(c),
        }));
    }
    *text = &s[close + 1..];
    Ok(Some(Token::Constant {
        value: Value::str(content),
    }))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\'') => out.push('\''),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn try_numeric(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    let bytes = s.as_bytes();
    let mut count = 0;
    while count < bytes.len() && (bytes[count].is_ascii_digit() || bytes[count] == b'.') {
        count += 1;
    }
    if count > 0 && bytes[count - 1] == b'.' {
        count -= 1;
    }
    if count == 0 {
        return Ok(None);
    }
    let digits = &s[..count];

    // Optional width/kind suffix; a malformed one falls back to the plain
    // numeric prefix.
    if let Some(&suffix) = bytes.get(count) {
        let suffix = suffix.to_ascii_lowercase();
        let long_unsigned = suffix == b'u' && bytes.get(count + 1).map(|b| b.to_ascii_lowercase()) == Some(b'l');
        let value = if long_unsigned {
            digits.parse::<u64>().ok().map(Value::U64)
        } else {
            match suffix {
                b'u' => digits.parse::<u32>().ok().map(Value::U32),
                b'l' => digits.parse::<i64>().ok().map(Value::I64),
                b'f' => digits.parse::<f32>().ok().map(Value::F32),
                b'd' => digits.parse::<f64>().ok().map(Value::F64),
                b'm' => digits.parse::<Decimal>().ok().map(Value::Decimal),
                _ => None,
            }
        };
        if let Some(value) = value {
            let consumed = count + if long_unsigned { 2 } else { 1 };
            *text = &s[consumed..];
            return Ok(Some(Token::Constant { value }));
        }
    }

    let value = if digits.contains('.') {
        digits.parse::<f64>().ok().map(Value::F64)
    } else {
        digits.parse::<i32>().ok().map(Value::I32)
    };
    let Some(value) = value else {
        return Ok(None);
    };
    *text = &s[count..];
    Ok(Some(Token::Constant { value }))
}

/// `-x`, `+x`, `!x`.
fn try_unary(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    let op = match s.as_bytes().first() {
        Some(b'-') => Operator::Negate,
        Some(b'+') => Operator::UnaryPlus,
        Some(b'!') => Operator::Not,
        _ => return Ok(None),
    };
    let mut probe = &s[1..];
    let Some(operand) = try_value_token(&mut probe)? else {
        return Ok(None);
    };
    *text = probe;
    Ok(Some(Token::UnaryOp {
        op,
        operand: Box::new(operand),
    }))
}

/// `(p1, p2) => body`; the body takes the entire remaining input.
fn try_lambda(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    if !s.starts_with('(') {
        return Ok(None);
    }
    let Some(close) = find_matching(s, b'(', b')') else {
        return Ok(None);
    };
    let inner = &s[1..close];
    let mut params: Vec<EcoString> = Vec::new();
    if !inner.trim().is_empty() {
        for part in split_top_level_commas(inner) {
            let mut part = part.trim();
            let Some(name) = take_ident(&mut part) else {
                return Ok(None);
            };
            if !part.is_empty() {
                return Ok(None);
            }
            params.push(name.into());
        }
    }
    let mut probe = &s[close + 1..];
    skip_ws(&mut probe);
    let Some(rest) = probe.strip_prefix("=>") else {
        return Ok(None);
    };
    let Some(body) = try_expression(rest)? else {
        return Ok(None);
    };
    *text = &rest[rest.len()..];
    Ok(Some(Token::Lambda {
        params,
        body: Arc::new(body),
    }))
}

/// `(expr)`.
fn try_bracketed(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    if !s.starts_with('(') {
        return Ok(None);
    }
    let Some(close) = find_matching(s, b'(', b')') else {
        return Ok(None);
    };
    let Some(inner) = try_expression(&s[1..close])? else {
        return Ok(None);
    };
    *text = &s[close + 1..];
    Ok(Some(Token::Bracketed {
        inner: Box::new(inner),
    }))
}

/// `(Type)value`.
fn try_cast(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let s = *text;
    if !s.starts_with('(') {
        return Ok(None);
    }
    let Some(close) = find_matching(s, b'(', b')') else {
        return Ok(None);
    };
    let mut inner = s[1..close].trim();
    let Some(ty) = try_type(&mut inner)? else {
        return Ok(None);
    };
    if !inner.trim().is_empty() {
        return Ok(None);
    }
    let mut probe = &s[close + 1..];
    let Some(target) = try_value_token(&mut probe)? else {
        return Ok(None);
    };
    *text = probe;
    Ok(Some(Token::Cast {
        ty,
        target: Box::new(target),
    }))
}

/// `typeof(Type)`.
fn try_typeof(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let Some(mut probe) = strip_keyword(text, "typeof") else {
        return Ok(None);
    };
    skip_ws(&mut probe);
    if !probe.starts_with('(') {
        return Ok(None);
    }
    let Some(close) = find_matching(probe, b'(', b')') else {
        return Ok(None);
    };
    let mut inner = probe[1..close].trim();
    let Some(ty) = try_type(&mut inner)? else {
        return Ok(None);
    };
    if !inner.trim().is_empty() {
        return Ok(None);
    }
    *text = &probe[close + 1..];
    Ok(Some(Token::Typeof { ty }))
}

/// `throw value`.
fn try_throw(text: &mut &str) -> Result<Option<Token>, ParseError> {
    let Some(mut probe) = strip_keyword(text, "throw") else {
        return Ok(None);
    };
    skip_ws(&mut probe);
    let Some(value) = try_value_token(&mut probe)? else {
        return Ok(None);
    };
    *text = probe;
    Ok(Some(Token::Throw {
        value: Box::new(value),
    }))
}

// ---------------------------------------------------------------------------
// Type names.
// ---------------------------------------------------------------------------

/// Parses a (possibly dotted) type name with optional `<..>` arguments and
/// `[]` suffixes, resolving it through the registry. Ambiguity is fatal.
fn try_type(text: &mut &str) -> Result<Option<TypeRef>, ParseError> {
    let s = *text;
    let Some((segments, ends)) = peek_dotted(s) else {
        return Ok(None);
    };
    let name = segments.join(".");
    let mut probe = &s[ends[segments.len() - 1]..];

    let mut generic_args = Vec::new();
    if probe.starts_with('<') {
        let mut generic_probe = probe;
        if let Some(args) = try_type_args(&mut generic_probe)? {
            generic_args = args;
            probe = generic_probe;
        }
    }

    let Some(mut ty) = registry::global().resolve_type(&name, &generic_args)? else {
        return Ok(None);
    };
    while let Some(rest) = probe.strip_prefix("[]") {
        ty = TypeRef::Array(Arc::new(ty));
        probe = rest;
    }
    *text = probe;
    Ok(Some(ty))
}

/// `<T1, T2>`; all-or-nothing.
fn try_type_args(text: &mut &str) -> Result<Option<Vec<TypeRef>>, ParseError> {
    let s = *text;
    let Some(mut probe) = s.strip_prefix('<') else {
        return Ok(None);
    };
    let mut args = Vec::new();
    loop {
        skip_ws(&mut probe);
        let Some(ty) = try_type(&mut probe)? else {
            return Ok(None);
        };
        args.push(ty);
        skip_ws(&mut probe);
        if let Some(rest) = probe.strip_prefix(',') {
            probe = rest;
            continue;
        }
        let Some(rest) = probe.strip_prefix('>') else {
            return Ok(None);
        };
        probe = rest;
        break;
    }
    *text = probe;
    Ok(Some(args))
}

// ---------------------------------------------------------------------------
// Argument lists.
// ---------------------------------------------------------------------------

/// `(a, b, c)` or `[i]`: splits on top-level commas and parses every part
/// as a full expression. All-or-nothing.
fn try_argument_list(
    text: &mut &str,
    open: char,
    close: char,
) -> Result<Option<Vec<Token>>, ParseError> {
    let s = *text;
    if !s.starts_with(open) {
        return Ok(None);
    }
    let Some(close_at) = find_matching(s, open as u8, close as u8) else {
        return Ok(None);
    };
    let inner = &s[open.len_utf8()..close_at];
    let mut args = Vec::new();
    if !inner.trim().is_empty() {
        for part in split_top_level_commas(inner) {
            let Some(token) = try_expression(part.trim())? else {
                return Ok(None);
            };
            args.push(token);
        }
    }
    *text = &s[close_at + close.len_utf8()..];
    Ok(Some(args))
}

// ---------------------------------------------------------------------------
// Text scanning helpers. All quote-aware: a `'..'` literal hides brackets,
// commas and operators from structural scans, and `\'` does not terminate.
// ---------------------------------------------------------------------------

fn skip_ws(text: &mut &str) {
    *text = text.trim_start();
}

/// Consumes an identifier: `[A-Za-z_][A-Za-z0-9_]*`.
fn take_ident<'a>(text: &mut &'a str) -> Option<&'a str> {
    let s = *text;
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let valid = if i == 0 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            break;
        }
        len = i + c.len_utf8();
    }
    if len == 0 {
        return None;
    }
    *text = &s[len..];
    Some(&s[..len])
}

/// Peeks a dotted identifier chain without consuming; returns the
/// segments and the byte offset just past each one.
fn peek_dotted(s: &str) -> Option<(Vec<&str>, Vec<usize>)> {
    let mut segments = Vec::new();
    let mut ends = Vec::new();
    let mut probe = s;
    loop {
        let Some(ident) = take_ident(&mut probe) else {
            // A trailing dot ends the chain at the previous segment.
            if segments.is_empty() {
                return None;
            }
            break;
        };
        segments.push(ident);
        ends.push(s.len() - probe.len());
        match probe.strip_prefix('.') {
            Some(rest) => probe = rest,
            None => break,
        }
    }
    Some((segments, ends))
}

/// Strips a keyword followed by a non-identifier character, returning the
/// remainder.
fn strip_keyword<'a>(text: &&'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' => None,
        _ => Some(rest),
    }
}

/// Byte index of the close matching the open bracket at index 0.
fn find_matching(s: &str, open: u8, close: u8) -> Option<usize> {
    let bytes = s.as_bytes();
    debug_assert_eq!(bytes.first(), Some(&open));
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'\'' {
                in_quote = false;
            }
            continue;
        }
        if b == b'\'' {
            in_quote = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Splits on commas at bracket depth 0, outside quotes.
fn split_top_level_commas(inner: &str) -> Vec<&str> {
    let bytes = inner.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'\'' {
                in_quote = false;
            }
            continue;
        }
        match b {
            b'\'' => in_quote = true,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

/// First byte position at bracket depth 0 (outside quotes) where the
/// predicate matches the remaining input.
fn scan_top_level(s: &str, mut pred: impl FnMut(&str) -> bool) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'\'' {
                in_quote = false;
            }
            continue;
        }
        match b {
            b'\'' => {
                in_quote = true;
                continue;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                continue;
            }
            b')' | b']' | b'}' => {
                depth -= 1;
                continue;
            }
            _ => {}
        }
        if depth == 0 && pred(&s[i..]) {
            return Some(i);
        }
    }
    None
}

/// Locates the `?` and matching `:` of a top-level ternary, skipping `??`
/// pairs and `?.` accesses.
fn split_ternary(s: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut escaped = false;
    let mut question: Option<usize> = None;
    let mut level = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'\'' {
                in_quote = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' => in_quote = true,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'?' if depth == 0 => {
                if matches!(bytes.get(i + 1), Some(&b'?') | Some(&b'.')) {
                    i += 2;
                    continue;
                }
                match question {
                    None => question = Some(i),
                    Some(_) => level += 1,
                }
            }
            b':' if depth == 0 => {
                if let Some(q) = question {
                    if level == 0 {
                        return Some((q, i));
                    }
                    level -= 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
