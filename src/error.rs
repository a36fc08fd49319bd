//! Error taxonomy for the query-to-circuit compiler.
//!
//! Every error is unrecoverable at the point it is raised: the compiler never
//! emits a partial circuit, because silently dropping a clause would produce a
//! circuit strictly weaker than the query it claims to verify.

use thiserror::Error;

/// Errors raised while encoding an RDF term into its fixed-width slot vector.
///
/// The lexical value and datatype travel with the error so that a failing
/// literal can be reported verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The encoded payload does not fit the slot budget.
    #[error("value `{value}` ({datatype}) needs {needed} slots but only {budget} are available")]
    LengthExceeded {
        value: String,
        datatype: String,
        needed: usize,
        budget: usize,
    },

    /// The value fails the lexical grammar of its datatype.
    #[error("`{value}` is not a valid {datatype} lexical form")]
    InvalidLexicalForm { value: String, datatype: String },

    /// A derived-integer value lies outside the fixed bounds of its subtype,
    /// or an integer does not fit the native slot type.
    #[error("integer `{value}` is out of range for {datatype}")]
    IntegerRange { value: String, datatype: String },

    /// A slot vector handed to the decoder starts with an unknown discriminant.
    #[error("unknown term discriminant {0}")]
    InvalidDiscriminant(i128),

    /// A slot vector is structurally broken (truncated field, byte slot out of
    /// 0..=255, invalid UTF-8, ...).
    #[error("malformed encoded term: {0}")]
    MalformedPayload(String),
}

impl EncodeError {
    pub(crate) fn invalid(value: &str, datatype: &str) -> Self {
        EncodeError::InvalidLexicalForm {
            value: value.to_string(),
            datatype: datatype.to_string(),
        }
    }

    pub(crate) fn out_of_range(value: &str, datatype: &str) -> Self {
        EncodeError::IntegerRange {
            value: value.to_string(),
            datatype: datatype.to_string(),
        }
    }
}

/// Errors raised by lowering, optimization, or emission.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The query algebra is not of the supported Project -> [Filter] -> BGP
    /// shape (OPTIONAL, UNION, aggregates, property paths, ...).
    #[error("unsupported query shape: {0}")]
    ParseShape(String),

    /// A filter uses an operator or argument shape the compiler cannot lower.
    #[error("unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    /// Blank nodes must be eliminated before lowering.
    #[error("unexpected blank node `{0}`; blank nodes must be removed in preprocessing")]
    UnexpectedBlankNode(String),

    /// Triple patterns outside the default graph are not supported.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Two compared operands have encodings of different widths. Unreachable
    /// while a single term width is used throughout.
    #[error("encoded term widths differ: {left} vs {right}")]
    TermElementLengthMismatch { left: usize, right: usize },

    /// The emitter met a constraint node it has no lowering for.
    #[error("unsupported constraint: {0}")]
    UnsupportedConstraintType(String),

    /// Term encoding failed while emitting a constant.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Surface-syntax parse failure at the `compile_query` boundary.
    #[error("parse error: {0}")]
    Parse(String),
}
