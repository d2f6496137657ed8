use super::{Error, Input};
use std::io;

/// Options relax the grammar for hand-maintained inputs.
/// Response bodies are tokenized with the strict defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Permit a `,` before the closing bracket of an array or object.
    pub allow_trailing_commas: bool,
    /// Permit bare identifiers (`[A-Za-z_$][A-Za-z0-9_$.]*`) as object keys.
    pub allow_unquoted_keys: bool,
}

impl Options {
    pub fn lenient() -> Self {
        Self {
            allow_trailing_commas: true,
            allow_unquoted_keys: true,
        }
    }
}

/// Visitor receives one callback per JSON value, in document order.
///
/// Scalar callbacks return `false` to abort the parse. Container-item
/// callbacks are handed the input positioned just before the item's first
/// byte, and are expected to recurse through [`parse_value`], as the
/// default implementations do. Overriding them lets an implementation wrap
/// the recursion of each child value with its own frame bookkeeping.
pub trait Visitor<R: io::Read>: Sized {
    fn null(&mut self) -> bool {
        true
    }
    fn boolean(&mut self, _value: bool) -> bool {
        true
    }
    fn integer(&mut self, _value: i64) -> bool {
        true
    }
    fn number(&mut self, _value: f64) -> bool {
        true
    }
    fn string(&mut self, _value: &str) -> bool {
        true
    }

    fn array_begin(&mut self) -> bool {
        true
    }
    fn array_item(&mut self, input: &mut Input<R>, _index: usize) -> Result<(), Error> {
        parse_value(self, input)
    }
    fn array_end(&mut self, _len: usize) -> bool {
        true
    }

    fn object_begin(&mut self) -> bool {
        true
    }
    fn object_item(&mut self, input: &mut Input<R>, _key: &str) -> Result<(), Error> {
        parse_value(self, input)
    }
    fn object_end(&mut self) -> bool {
        true
    }
}

/// Parse one complete document.
/// An empty (or whitespace-only) input is success without any callback.
pub fn parse_document<R, V>(visitor: &mut V, input: &mut Input<R>) -> Result<(), Error>
where
    R: io::Read,
    V: Visitor<R>,
{
    skip_whitespace(input)?;
    if input.peek()?.is_none() {
        return Ok(());
    }
    parse_value(visitor, input)?;
    skip_whitespace(input)?;
    match input.peek()? {
        None => Ok(()),
        Some(_) => Err(input.syntax("unexpected trailing characters")),
    }
}

/// Parse the single value the input is positioned at.
pub fn parse_value<R, V>(visitor: &mut V, input: &mut Input<R>) -> Result<(), Error>
where
    R: io::Read,
    V: Visitor<R>,
{
    skip_whitespace(input)?;
    let Some(byte) = input.peek()? else {
        return Err(input.syntax("unexpected end of input"));
    };
    match byte {
        b'n' => {
            expect_literal(input, "null")?;
            check(visitor.null(), input)
        }
        b't' => {
            expect_literal(input, "true")?;
            check(visitor.boolean(true), input)
        }
        b'f' => {
            expect_literal(input, "false")?;
            check(visitor.boolean(false), input)
        }
        b'"' => {
            let value = parse_string(input)?;
            check(visitor.string(&value), input)
        }
        b'{' => parse_object(visitor, input),
        b'[' => parse_array(visitor, input),
        b'-' | b'0'..=b'9' => parse_number(visitor, input),
        byte => Err(input.syntax(format!("unexpected character `{}`", byte as char))),
    }
}

fn check<R: io::Read>(ok: bool, input: &Input<R>) -> Result<(), Error> {
    if ok {
        Ok(())
    } else {
        Err(input.aborted())
    }
}

fn skip_whitespace<R: io::Read>(input: &mut Input<R>) -> Result<(), Error> {
    while let Some(b' ' | b'\t' | b'\n' | b'\r') = input.peek()? {
        input.next()?;
    }
    Ok(())
}

fn expect_literal<R: io::Read>(input: &mut Input<R>, literal: &'static str) -> Result<(), Error> {
    for want in literal.bytes() {
        if input.next()? != Some(want) {
            return Err(input.syntax(format!("expected `{literal}`")));
        }
    }
    Ok(())
}

fn parse_array<R, V>(visitor: &mut V, input: &mut Input<R>) -> Result<(), Error>
where
    R: io::Read,
    V: Visitor<R>,
{
    input.next()?; // Consume `[`.
    input.enter()?;
    check(visitor.array_begin(), input)?;

    let mut index = 0;
    skip_whitespace(input)?;
    if !input.eat(b']')? {
        loop {
            visitor.array_item(input, index)?;
            index += 1;

            skip_whitespace(input)?;
            if input.eat(b',')? {
                skip_whitespace(input)?;
                if input.options().allow_trailing_commas && input.eat(b']')? {
                    break;
                }
                continue;
            }
            if input.eat(b']')? {
                break;
            }
            return Err(input.syntax("expected `,` or `]` in array"));
        }
    }

    input.leave();
    check(visitor.array_end(index), input)
}

fn parse_object<R, V>(visitor: &mut V, input: &mut Input<R>) -> Result<(), Error>
where
    R: io::Read,
    V: Visitor<R>,
{
    input.next()?; // Consume `{`.
    input.enter()?;
    check(visitor.object_begin(), input)?;

    skip_whitespace(input)?;
    if !input.eat(b'}')? {
        loop {
            skip_whitespace(input)?;
            let key = parse_key(input)?;

            skip_whitespace(input)?;
            if !input.eat(b':')? {
                return Err(input.syntax("expected `:` after object key"));
            }
            skip_whitespace(input)?;
            visitor.object_item(input, &key)?;

            skip_whitespace(input)?;
            if input.eat(b',')? {
                skip_whitespace(input)?;
                if input.options().allow_trailing_commas && input.eat(b'}')? {
                    break;
                }
                continue;
            }
            if input.eat(b'}')? {
                break;
            }
            return Err(input.syntax("expected `,` or `}` in object"));
        }
    }

    input.leave();
    check(visitor.object_end(), input)
}

fn parse_key<R: io::Read>(input: &mut Input<R>) -> Result<String, Error> {
    match input.peek()? {
        Some(b'"') => parse_string(input),
        Some(byte)
            if input.options().allow_unquoted_keys
                && (byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$') =>
        {
            let mut key = String::new();
            while let Some(byte) = input.peek()? {
                if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'$' | b'.') {
                    key.push(byte as char);
                    input.next()?;
                } else {
                    break;
                }
            }
            Ok(key)
        }
        _ => Err(input.syntax("expected object key")),
    }
}

fn parse_number<R, V>(visitor: &mut V, input: &mut Input<R>) -> Result<(), Error>
where
    R: io::Read,
    V: Visitor<R>,
{
    let mut text = String::new();
    let mut is_float = false;

    if input.eat(b'-')? {
        text.push('-');
    }
    let digits = digits_into(&mut text, input)?;
    if digits == 0 {
        return Err(input.syntax("malformed number"));
    }

    if input.eat(b'.')? {
        is_float = true;
        text.push('.');
        if digits_into(&mut text, input)? == 0 {
            return Err(input.syntax("expected digits after decimal point"));
        }
    }
    if let Some(b'e' | b'E') = input.peek()? {
        is_float = true;
        input.next()?;
        text.push('e');
        if input.eat(b'-')? {
            text.push('-');
        } else if input.eat(b'+')? {
            text.push('+');
        }
        if digits_into(&mut text, input)? == 0 {
            return Err(input.syntax("expected digits in exponent"));
        }
    }

    if !is_float {
        // i64 when it fits; values beyond the i64 range degrade to f64.
        if let Ok(value) = text.parse::<i64>() {
            return check(visitor.integer(value), input);
        }
    }
    let value: f64 = text
        .parse()
        .map_err(|_| input.syntax("malformed number"))?;
    check(visitor.number(value), input)
}

fn digits_into<R: io::Read>(text: &mut String, input: &mut Input<R>) -> Result<usize, Error> {
    let mut count = 0;
    while let Some(byte @ b'0'..=b'9') = input.peek()? {
        text.push(byte as char);
        input.next()?;
        count += 1;
    }
    Ok(count)
}

fn parse_string<R: io::Read>(input: &mut Input<R>) -> Result<String, Error> {
    input.next()?; // Consume the opening quote.
    let mut raw = Vec::<u8>::new();
    loop {
        let Some(byte) = input.next()? else {
            return Err(input.syntax("unterminated string"));
        };
        match byte {
            b'"' => break,
            b'\\' => parse_escape(&mut raw, input)?,
            0x00..=0x1f => {
                return Err(input.syntax("unescaped control character in string"));
            }
            byte => raw.push(byte),
        }
    }
    String::from_utf8(raw).map_err(|_| input.syntax("invalid utf-8 in string"))
}

fn parse_escape<R: io::Read>(raw: &mut Vec<u8>, input: &mut Input<R>) -> Result<(), Error> {
    let Some(byte) = input.next()? else {
        return Err(input.syntax("unterminated string escape"));
    };
    let simple = match byte {
        b'"' => b'"',
        b'\\' => b'\\',
        b'/' => b'/',
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'u' => {
            let unit = parse_hex4(input)?;
            let scalar = if (0xd800..0xdc00).contains(&unit) {
                // High surrogate: a `\uXXXX` low surrogate must follow.
                if input.next()? != Some(b'\\') || input.next()? != Some(b'u') {
                    return Err(input.syntax("unpaired surrogate in string escape"));
                }
                let low = parse_hex4(input)?;
                if !(0xdc00..0xe000).contains(&low) {
                    return Err(input.syntax("invalid low surrogate in string escape"));
                }
                0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00)
            } else if (0xdc00..0xe000).contains(&unit) {
                return Err(input.syntax("unpaired surrogate in string escape"));
            } else {
                unit
            };
            let Some(ch) = char::from_u32(scalar) else {
                return Err(input.syntax("invalid unicode escape"));
            };
            let mut buf = [0u8; 4];
            raw.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            return Ok(());
        }
        _ => return Err(input.syntax("unrecognized string escape")),
    };
    raw.push(simple);
    Ok(())
}

fn parse_hex4<R: io::Read>(input: &mut Input<R>) -> Result<u32, Error> {
    let mut value = 0u32;
    for _ in 0..4 {
        let Some(byte) = input.next()? else {
            return Err(input.syntax("unterminated unicode escape"));
        };
        let digit = match byte {
            b'0'..=b'9' => (byte - b'0') as u32,
            b'a'..=b'f' => (byte - b'a') as u32 + 10,
            b'A'..=b'F' => (byte - b'A') as u32 + 10,
            _ => return Err(input.syntax("invalid unicode escape digit")),
        };
        value = (value << 4) | digit;
    }
    Ok(value)
}
