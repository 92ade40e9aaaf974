//! Operation descriptors: one immutable record per remote command.
//!
//! A descriptor names the command, the HTTP method, the fixed query
//! parameters every call carries, the positional parameters callers supply,
//! and the two result strategies. Descriptors are `'static` constants shared
//! by every invocation; see `commands` for the table.

use crate::fallback::Fallback;
use crate::http::HttpMethod;
use crate::parser::ResponseParser;

/// A positional parameter of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub required: bool,
}

impl Param {
    pub const fn required(name: &'static str) -> Self {
        Self { name, required: true }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name, required: false }
    }
}

/// Static metadata binding a command to its request shape and strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub command: &'static str,
    pub method: HttpMethod,
    /// Emitted right after `command`, e.g. `listAll=true`.
    pub fixed: &'static [(&'static str, &'static str)],
    pub params: &'static [Param],
    pub parser: ResponseParser,
    pub fallback: Fallback,
}

impl Operation {
    pub fn required_params(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| p.required).map(|p| p.name)
    }

    /// True when a call carries nothing beyond `response` and `command`.
    pub fn takes_no_arguments(&self) -> bool {
        self.params.is_empty() && self.fixed.is_empty()
    }

    /// Whether `name` is already claimed by the descriptor itself.
    pub(crate) fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name.eq_ignore_ascii_case(name))
            || self.fixed.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}
