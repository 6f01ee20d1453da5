// Xkeysd Mapping Model
// Compiles macro specification strings into structured chord sequences

use smallvec::SmallVec;

use crate::catalog::{EV_KEY, EV_REL};
use crate::symbol::{SymbolError, SymbolTable};

/// Maximum number of keys asserted simultaneously in one chord block.
pub const MAX_CHORD_KEYS: usize = 4;

/// Separator between chord blocks in a macro specification.
const BLOCK_SEPARATOR: char = ';';
/// Separator between simultaneous keys within one chord block.
const KEY_SEPARATOR: char = '+';

/// Errors from compiling a slot's specification string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error("'{name}' is not in the {expected} namespace")]
    Validation { name: String, expected: &'static str },

    #[error("chord block '{0}' exceeds {MAX_CHORD_KEYS} simultaneous keys")]
    Capacity(String),
}

/// An ordered set of key codes asserted as one unit.
///
/// Invariant: at most [`MAX_CHORD_KEYS`] entries, enforced at compile time;
/// the storage never spills to the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordBlock {
    keys: SmallVec<[u16; MAX_CHORD_KEYS]>,
}

impl ChordBlock {
    pub fn keys(&self) -> &[u16] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A non-empty, ordered sequence of chord blocks bound to one button slot.
///
/// One block replays with hold semantics; more than one replays as a
/// fire-and-forget burst on the press edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMacro {
    blocks: Vec<ChordBlock>,
}

impl KeyMacro {
    pub fn blocks(&self) -> &[ChordBlock] {
        &self.blocks
    }

    /// A simple macro is a single chord block.
    pub fn is_simple(&self) -> bool {
        self.blocks.len() == 1
    }

    /// Every key code referenced anywhere in this macro.
    pub fn key_codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.blocks.iter().flat_map(|b| b.keys.iter().copied())
    }
}

/// Compile a button slot's macro specification.
///
/// The grammar has two levels: `;` separates chord blocks and `+` separates
/// the simultaneous keys inside a block, e.g.
/// `"KEY_LEFTALT+KEY_T;KEY_LEFTCTRL+KEY_LEFTALT+KEY_DELETE;KEY_A"`.
/// Every token must resolve into the key namespace.
pub fn compile_macro(table: &SymbolTable, spec: &str) -> Result<KeyMacro, MappingError> {
    let mut blocks = Vec::new();

    for block_spec in spec.split(BLOCK_SEPARATOR) {
        let mut keys: SmallVec<[u16; MAX_CHORD_KEYS]> = SmallVec::new();

        for token in block_spec.split(KEY_SEPARATOR) {
            let token = token.trim();
            let id = table.resolve(token)?;
            if id.kind != EV_KEY {
                return Err(MappingError::Validation {
                    name: token.to_string(),
                    expected: "EV_KEY",
                });
            }
            if keys.len() == MAX_CHORD_KEYS {
                return Err(MappingError::Capacity(block_spec.trim().to_string()));
            }
            keys.push(id.code);
        }

        blocks.push(ChordBlock { keys });
    }

    Ok(KeyMacro { blocks })
}

/// Compile a dial slot's specification: exactly one token resolving into the
/// relative-axis namespace.
pub fn compile_dial(table: &SymbolTable, spec: &str) -> Result<u16, MappingError> {
    let token = spec.trim();
    let id = table.resolve(token)?;
    if id.kind != EV_REL {
        return Err(MappingError::Validation {
            name: token.to_string(),
            expected: "EV_REL",
        });
    }
    Ok(id.code)
}
