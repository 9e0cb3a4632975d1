use thiserror::Error;

use crate::schema::FieldKind;

/// Failures while walking an argument buffer.
///
/// Any of these invalidates the rest of the buffer: a cursor that reported
/// one is drained and every later read fails too.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated field at offset {offset}: need {needed} bytes, {remaining} remain")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("schema mismatch at field {index}: schema expects {expected}, caller read {requested}")]
    SchemaMismatch {
        index: usize,
        expected: FieldKind,
        requested: FieldKind,
    },
    #[error("schema exhausted: caller read {requested} past the last of {len} fields")]
    SchemaExhausted { len: usize, requested: FieldKind },
    #[error("decoded {decoded} of {len} schema fields")]
    SchemaIncomplete { decoded: usize, len: usize },
    #[error("{remaining} trailing bytes after the last field")]
    TrailingBytes { remaining: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("field of {len} bytes does not fit a 32-bit length prefix")]
    FieldTooLarge { len: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown field kind {ch:?} at position {pos}")]
    UnknownKind { ch: char, pos: usize },
    #[error("schema has {expected} fields, got {got} values")]
    ArityMismatch { expected: usize, got: usize },
    #[error("field {index}: schema expects {expected}, value is {got}")]
    KindMismatch {
        index: usize,
        expected: FieldKind,
        got: FieldKind,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Template rendering failures. These are programmer errors in the template
/// or argument list; nothing is emitted when one occurs.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("conversion %{conversion} at byte {pos} has no argument")]
    MissingArgument { pos: usize, conversion: char },
    #[error("argument {index} cannot be rendered by %{conversion}")]
    ArgumentMismatch { index: usize, conversion: char },
    #[error("unknown conversion %{conversion} at byte {pos}")]
    UnknownConversion { pos: usize, conversion: char },
    #[error("template ends inside a conversion starting at byte {pos}")]
    Incomplete { pos: usize },
    #[error("conversion at byte {pos} asks for width {width}, limit is {max}")]
    WidthTooLarge { pos: usize, width: usize, max: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("security context substitution rejected: {reason}")]
    ContextSubstitutionRejected { reason: String },
    #[error("a security context override is already active on this thread")]
    AlreadyActive,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WideError {
    #[error("wide string needs {needed} units, destination holds {capacity}")]
    DoesNotFit { needed: usize, capacity: usize },
}
