//! Callback calling signatures.
//!
//! Textual form: `(str, int) -> list`. An empty parameter list is `()`.

use super::value::ValueTag;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declared argument and result shape of one registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<ValueTag>,
    pub returns: ValueTag,
}

impl Signature {
    pub fn new(params: Vec<ValueTag>, returns: ValueTag) -> Self {
        Self { params, returns }
    }

    /// Signature of a callback that takes no arguments.
    pub fn nullary(returns: ValueTag) -> Self {
        Self::new(Vec::new(), returns)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Parses `(tag, tag, ...) -> tag`.
    pub fn parse(text: &str) -> Result<Self, SignatureParseError> {
        let text = text.trim();
        let (params_part, returns_part) = text
            .split_once("->")
            .ok_or_else(|| SignatureParseError::MissingReturn(text.to_string()))?;

        let params_part = params_part.trim();
        let inner = params_part
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| SignatureParseError::MissingParens(text.to_string()))?;

        let mut params = Vec::new();
        if !inner.trim().is_empty() {
            for raw in inner.split(',') {
                let tag = ValueTag::parse(raw)
                    .ok_or_else(|| SignatureParseError::UnknownTag(raw.trim().to_string()))?;
                if tag == ValueTag::Null {
                    return Err(SignatureParseError::NullParameter);
                }
                params.push(tag);
            }
        }

        let returns = ValueTag::parse(returns_part)
            .ok_or_else(|| SignatureParseError::UnknownTag(returns_part.trim().to_string()))?;

        Ok(Self { params, returns })
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// Signature text parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    MissingReturn(String),
    MissingParens(String),
    UnknownTag(String),
    NullParameter,
}

impl Display for SignatureParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingReturn(text) => write!(f, "signature is missing `-> <return>`: {text}"),
            Self::MissingParens(text) => {
                write!(f, "signature parameters must be parenthesized: {text}")
            }
            Self::UnknownTag(tag) => write!(f, "unknown value tag in signature: `{tag}`"),
            Self::NullParameter => write!(f, "null is only valid as a return tag"),
        }
    }
}

impl Error for SignatureParseError {}
