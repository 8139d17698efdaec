use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of an injectable unit.
///
/// A token is either a type (including `dyn Trait` types) or an opaque
/// string key used by value and factory providers.
#[derive(Clone)]
pub enum Token {
    Type { id: TypeId, name: &'static str },
    Named(Cow<'static, str>),
}

impl Token {
    /// Token for the type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Token for a string key, usable in `const` items.
    pub const fn named(key: &'static str) -> Self {
        Self::Named(Cow::Borrowed(key))
    }

    /// Human readable name, without the module path for type tokens.
    pub fn name(&self) -> &str {
        match self {
            Self::Type { name, .. } => short_type_name(name),
            Self::Named(key) => key,
        }
    }
}

/// Strips module paths from a type name, keeping generic arguments readable.
pub(crate) fn short_type_name(name: &str) -> &str {
    let head = name.split('<').next().unwrap_or(name);
    match head.rfind("::") {
        Some(pos) if !head.starts_with("dyn ") => &name[pos + 2..],
        _ => name,
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            (Self::Named(a), Self::Named(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Type { id, .. } => {
                0u8.hash(state);
                id.hash(state);
            }
            Self::Named(key) => {
                1u8.hash(state);
                key.hash(state);
            }
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => write!(f, "Token({name})"),
            Self::Named(key) => write!(f, "Token(\"{key}\")"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&'static str> for Token {
    fn from(key: &'static str) -> Self {
        Self::named(key)
    }
}

impl From<String> for Token {
    fn from(key: String) -> Self {
        Self::Named(Cow::Owned(key))
    }
}

impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}
