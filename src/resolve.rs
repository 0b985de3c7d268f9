//! Replaces the placeholder declarations left by code generation with
//! concrete C types, by scanning the generated text itself.
//!
//! A variable is *operated* if some line mentions it as a whole word and that
//! same line contains an arithmetic operator or `=`. Operated variables are
//! stored as `int`, the others as `double`. An assignment line contains its
//! own `=`, so any assigned variable ends up operated.

use log::trace;

use crate::codegen::PLACEHOLDER_TYPE;

/// Characters that may surround a whole-word variable occurrence, besides the
/// start and end of the line.
const BOUNDARY_CHARS: &[u8] = b" =(),;";

const OPERATOR_CHARS: &[char] = &['=', '+', '-', '*', '/'];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    Integer,
    Real,
}

impl Storage {
    pub const fn c_type(self) -> &'static str {
        match self {
            Storage::Integer => "int",
            Storage::Real => "double",
        }
    }

    pub const fn is_operated(self) -> bool {
        matches!(self, Storage::Integer)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedVariable {
    pub name: String,
    pub storage: Storage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// The finalized text: no placeholder declaration remains.
    pub code: String,
    /// Declared variables in declaration order.
    pub variables: Vec<ResolvedVariable>,
}

pub fn resolve(code: &str) -> Resolution {
    let variables: Vec<_> = code
        .lines()
        .filter_map(declared_name)
        .map(|name| {
            let storage = if is_operated(code, name) {
                Storage::Integer
            } else {
                Storage::Real
            };
            trace!("variable {name} resolved as {}", storage.c_type());
            ResolvedVariable {
                name: name.to_owned(),
                storage,
            }
        })
        .collect();

    let mut finalized = String::with_capacity(code.len());
    for line in code.split_inclusive('\n') {
        let storage = declared_name(line)
            .and_then(|name| variables.iter().find(|var| var.name == name))
            .map(|var| var.storage);
        match storage {
            Some(storage) => {
                finalized.push_str(storage.c_type());
                finalized.push_str(&line[PLACEHOLDER_TYPE.len()..]);
            }
            None => finalized.push_str(line),
        }
    }

    Resolution {
        code: finalized,
        variables,
    }
}

/// Returns `name` for a `ML_NUMERIC name;` line.
fn declared_name(line: &str) -> Option<&str> {
    line.trim_end_matches(['\n', '\r'])
        .strip_prefix(PLACEHOLDER_TYPE)?
        .strip_prefix(' ')?
        .strip_suffix(';')
}

fn is_operated(code: &str, name: &str) -> bool {
    code.lines()
        .any(|line| mentions(line, name) && line.contains(OPERATOR_CHARS))
}

/// Whether `line` contains `name` as a whole word.
fn mentions(line: &str, name: &str) -> bool {
    let bytes = line.as_bytes();
    line.match_indices(name).any(|(lo, _)| {
        let hi = lo + name.len();
        let before = lo.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(hi).copied();
        [before, after]
            .into_iter()
            .all(|c| c.is_none_or(|c| BOUNDARY_CHARS.contains(&c)))
    })
}
