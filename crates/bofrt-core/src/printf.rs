//! printf-style template rendering for module text output.
//!
//! Supported: `%d %i %u %x %X %o %c %s %p %%`, flags `- 0 + space #`, digit
//! width and precision. Length modifiers (`h`, `hh`, `l`, `ll`, `z`) are
//! accepted and ignored since arguments already carry their width.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::FormatError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrintfArg<'a> {
    Int(i64),
    UInt(u64),
    Char(char),
    Str(&'a str),
    Bytes(&'a [u8]),
    Ptr(usize),
}

impl From<i32> for PrintfArg<'_> {
    fn from(v: i32) -> Self {
        PrintfArg::Int(v.into())
    }
}

impl From<i64> for PrintfArg<'_> {
    fn from(v: i64) -> Self {
        PrintfArg::Int(v)
    }
}

impl From<u32> for PrintfArg<'_> {
    fn from(v: u32) -> Self {
        PrintfArg::UInt(v.into())
    }
}

impl From<u64> for PrintfArg<'_> {
    fn from(v: u64) -> Self {
        PrintfArg::UInt(v)
    }
}

impl<'a> From<&'a str> for PrintfArg<'a> {
    fn from(v: &'a str) -> Self {
        PrintfArg::Str(v)
    }
}

/// Upper bound on a conversion's width or precision.
pub const MAX_FIELD_WIDTH: usize = 4096;

#[derive(Clone, Copy, Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

pub fn render(template: &str, args: &[PrintfArg<'_>]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut next_arg = 0usize;
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let spec = parse_spec(&mut chars);
        let widest = spec.width.max(spec.precision).unwrap_or(0);
        if widest > MAX_FIELD_WIDTH {
            return Err(FormatError::WidthTooLarge {
                pos,
                width: widest,
                max: MAX_FIELD_WIDTH,
            });
        }
        skip_length_modifiers(&mut chars);
        let Some((_, conversion)) = chars.next() else {
            return Err(FormatError::Incomplete { pos });
        };
        if conversion == '%' {
            out.push('%');
            continue;
        }
        if !matches!(conversion, 'd' | 'i' | 'u' | 'x' | 'X' | 'o' | 'c' | 's' | 'p') {
            return Err(FormatError::UnknownConversion { pos, conversion });
        }
        let Some(arg) = args.get(next_arg) else {
            return Err(FormatError::MissingArgument { pos, conversion });
        };
        let rendered = render_one(&spec, conversion, *arg)
            .ok_or(FormatError::ArgumentMismatch {
                index: next_arg,
                conversion,
            })?;
        next_arg += 1;
        out.push_str(&rendered);
    }
    Ok(out)
}

fn parse_spec(chars: &mut Peekable<CharIndices<'_>>) -> Spec {
    let mut spec = Spec::default();
    while let Some(&(_, c)) = chars.peek() {
        match c {
            '-' => spec.left = true,
            '0' => spec.zero = true,
            '+' => spec.plus = true,
            ' ' => spec.space = true,
            '#' => spec.alt = true,
            _ => break,
        }
        chars.next();
    }
    spec.width = parse_digits(chars);
    if matches!(chars.peek(), Some(&(_, '.'))) {
        chars.next();
        spec.precision = Some(parse_digits(chars).unwrap_or(0));
    }
    spec
}

fn parse_digits(chars: &mut Peekable<CharIndices<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(&(_, c)) = chars.peek() {
        let Some(d) = c.to_digit(10) else { break };
        value = Some(
            value
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(d as usize),
        );
        chars.next();
    }
    value
}

fn skip_length_modifiers(chars: &mut Peekable<CharIndices<'_>>) {
    while matches!(chars.peek(), Some(&(_, 'h' | 'l' | 'z' | 'j' | 't'))) {
        chars.next();
    }
}

fn render_one(spec: &Spec, conversion: char, arg: PrintfArg<'_>) -> Option<String> {
    match conversion {
        'd' | 'i' => {
            let (negative, magnitude) = match arg {
                PrintfArg::Int(v) => (v < 0, v.unsigned_abs()),
                PrintfArg::UInt(v) => (false, v),
                PrintfArg::Char(c) => (false, u64::from(c)),
                _ => return None,
            };
            let sign = if negative {
                "-"
            } else if spec.plus {
                "+"
            } else if spec.space {
                " "
            } else {
                ""
            };
            Some(pad_number(spec, sign, &magnitude.to_string()))
        }
        'u' | 'x' | 'X' | 'o' => {
            let v = match arg {
                PrintfArg::Int(v) => v as u64,
                PrintfArg::UInt(v) => v,
                _ => return None,
            };
            let digits = match conversion {
                'u' => v.to_string(),
                'x' => format!("{v:x}"),
                'X' => format!("{v:X}"),
                _ => format!("{v:o}"),
            };
            let prefix = match conversion {
                'x' if spec.alt && v != 0 => "0x",
                'X' if spec.alt && v != 0 => "0X",
                'o' if spec.alt && v != 0 => "0",
                _ => "",
            };
            Some(pad_number(spec, prefix, &digits))
        }
        'p' => {
            let PrintfArg::Ptr(v) = arg else { return None };
            Some(pad_text(spec, &format!("0x{v:x}")))
        }
        'c' => {
            let c = match arg {
                PrintfArg::Char(c) => c,
                PrintfArg::Int(v) => char::from_u32(u32::try_from(v).ok()?)?,
                PrintfArg::UInt(v) => char::from_u32(u32::try_from(v).ok()?)?,
                _ => return None,
            };
            Some(pad_text(spec, c.encode_utf8(&mut [0u8; 4])))
        }
        's' => {
            let text = match arg {
                PrintfArg::Str(s) => std::borrow::Cow::Borrowed(s),
                PrintfArg::Bytes(b) => String::from_utf8_lossy(b),
                _ => return None,
            };
            let text: std::borrow::Cow<'_, str> = match spec.precision {
                Some(p) => text.chars().take(p).collect::<String>().into(),
                None => text,
            };
            Some(pad_text(spec, &text))
        }
        _ => None,
    }
}

fn pad_number(spec: &Spec, prefix: &str, digits: &str) -> String {
    let mut body = String::new();
    if let Some(p) = spec.precision {
        // C prints nothing for a zero value with zero precision.
        if p == 0 && digits == "0" {
            return pad_text(spec, prefix);
        }
        for _ in digits.len()..p {
            body.push('0');
        }
    }
    body.push_str(digits);

    let width = spec.width.unwrap_or(0);
    let len = prefix.len() + body.len();
    if len >= width {
        return format!("{prefix}{body}");
    }
    let fill = width - len;
    if spec.left {
        format!("{prefix}{body}{}", " ".repeat(fill))
    } else if spec.zero && spec.precision.is_none() {
        format!("{prefix}{}{body}", "0".repeat(fill))
    } else {
        format!("{}{prefix}{body}", " ".repeat(fill))
    }
}

fn pad_text(spec: &Spec, text: &str) -> String {
    let width = spec.width.unwrap_or(0);
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let fill = " ".repeat(width - len);
    if spec.left {
        format!("{text}{fill}")
    } else {
        format!("{fill}{text}")
    }
}
