//! Error category registry.
//!
//! An `error_code` crosses the wire as `(category_index, value)`. Both peers must agree on
//! the ordered list of categories so a remote index resolves back to a meaningful error.
//! Index 0 is reserved for the codec's own "ok / system" category; index 1 is always the
//! `armi` category ([`crate::error::ErrorKind`]). Application categories register after that.

use std::sync::Arc;

use crate::error::{Error, ErrorKind};

pub const SYSTEM_CATEGORY: u32 = 0;
pub const ARMI_CATEGORY: u32 = 1;

/// A named space of error values, identified on the wire by the index it is registered at.
pub trait ErrorCategory: Send + Sync {
    fn name(&self) -> &str;
    fn message(&self, value: u32) -> String;
}

struct SystemCategory;
impl ErrorCategory for SystemCategory {
    fn name(&self) -> &str {
        "system"
    }
    fn message(&self, value: u32) -> String {
        format!("system error {value}")
    }
}

struct ArmiCategory;
impl ErrorCategory for ArmiCategory {
    fn name(&self) -> &str {
        "armi"
    }
    fn message(&self, value: u32) -> String {
        ErrorKind::from_wire_value(value)
            .map(|k| k.as_str().to_string())
            .unwrap_or_else(|| format!("unknown armi error {value}"))
    }
}

/// Ordered, append-only list of categories shared by both peers of a connection.
pub struct CategoryRegistry {
    categories: Vec<Arc<dyn ErrorCategory>>,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self {
            categories: vec![Arc::new(SystemCategory), Arc::new(ArmiCategory)],
        }
    }

    /// Registers an application-defined category and returns its index.
    pub fn register(&mut self, category: Arc<dyn ErrorCategory>) -> u32 {
        self.categories.push(category);
        (self.categories.len() - 1) as u32
    }

    pub fn get(&self, index: u32) -> Option<&Arc<dyn ErrorCategory>> {
        self.categories.get(index as usize)
    }

    /// Encodes a local error as `(category_index, value)` for the wire.
    pub fn encode(&self, err: &Error) -> (u32, u32) {
        match err {
            Error::Local { kind, .. } => (ARMI_CATEGORY, kind.wire_value()),
            Error::Remote { category, code, .. } => (*category, *code),
            Error::Codec(_) | Error::Io(_) => (SYSTEM_CATEGORY, 1),
        }
    }

    /// Decodes a wire `(category_index, value)` pair back into an [`Error`].
    pub fn decode(&self, category: u32, value: u32) -> Error {
        match self.get(category) {
            None => Error::with_message(
                ErrorKind::InvalidErrorCategory,
                format!("unknown error category index {category}"),
            ),
            Some(cat) if category == ARMI_CATEGORY => ErrorKind::from_wire_value(value)
                .map(Error::new)
                .unwrap_or_else(|| Error::Remote {
                    category,
                    code: value,
                    message: cat.message(value),
                }),
            Some(cat) => Error::Remote {
                category,
                code: value,
                message: cat.message(value),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armi_category_round_trips() {
        let registry = CategoryRegistry::new();
        let err = Error::new(ErrorKind::InvalidArgumentCount);
        let (cat, val) = registry.encode(&err);
        assert_eq!(cat, ARMI_CATEGORY);
        let decoded = registry.decode(cat, val);
        assert_eq!(decoded.kind(), Some(ErrorKind::InvalidArgumentCount));
    }

    #[test]
    fn unknown_category_is_reported() {
        let registry = CategoryRegistry::new();
        let err = registry.decode(99, 0);
        assert_eq!(err.kind(), Some(ErrorKind::InvalidErrorCategory));
    }

    #[test]
    fn application_category_registers_after_armi() {
        struct AliensInvaded;
        impl ErrorCategory for AliensInvaded {
            fn name(&self) -> &str {
                "aliens_invaded"
            }
            fn message(&self, value: u32) -> String {
                format!("invasion code {value}")
            }
        }

        let mut registry = CategoryRegistry::new();
        let idx = registry.register(Arc::new(AliensInvaded));
        assert_eq!(idx, 2);
        let decoded = registry.decode(idx, 7);
        match decoded {
            Error::Remote { category, code, .. } => {
                assert_eq!(category, 2);
                assert_eq!(code, 7);
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }
}
