//! variable store
//!
//! [MemoryStore] keeps
//! - the global definitions, keyed by qualified name as written
//!   (`v`, `A[0]`, `ns:scope.var`)
//! - the current-iteration scope, where the engine binds one scalar per
//!   wheel per combination
//!
//! The iteration scope always wins on lookup, so a bound wheel element
//! shadows the global it came from for the duration of one combination.
//! A mangled name that misses both maps is unmangled and retried against
//! the globals: a variable that never needed a wheel was never mangled,
//! and its definition is only findable under its plain name.
use crate::mangle;
use crate::value::{DataType, Rval, Scalar};
use std::path::Path;

/// The engine's view of variable bindings
///
/// `bind` is the engine's only observable side effect; everything else it
/// does is read-only against the store.
pub trait VariableStore {
    /// Write a scalar into the current-iteration scope
    fn bind(&mut self, name: &str, value: Scalar, dtype: DataType);

    /// Read a possibly-qualified variable, with its type tag
    fn lookup(&self, name: &str) -> Option<(&Rval, DataType)>;
}

#[derive(Default, Debug)]
pub struct MemoryStore {
    globals: indexmap::IndexMap<String, Rval>,
    iteration: indexmap::IndexMap<String, Rval>,
}

impl MemoryStore {
    /// Define a global variable
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Rval>) {
        self.globals.insert(name.into(), value.into());
    }

    /// Define a global variable from its JSON form
    pub fn insert_json(
        &mut self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), LoadError> {
        let name = name.into();
        if value.is_null() {
            return Err(LoadError::NullValue(name));
        }

        self.globals.insert(name, value.into());
        Ok(())
    }
}

impl MemoryStore {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading variables");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let document: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&file_contents)?;

        for (name, value) in document {
            self.insert_json(name, value)?;
        }

        Ok(())
    }

    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut any_files_loaded = false;

        let read_dir = std::fs::read_dir(dir_path)?;
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let is_vars_file = dir_entry
                .file_name()
                .to_string_lossy()
                .ends_with("vars.json");
            if !is_vars_file {
                continue;
            }

            let file_path = dir_entry.path();
            self.load_file(&file_path)?;
            any_files_loaded = true;
        }

        if !any_files_loaded {
            return Err(LoadError::NoFilesFound);
        }

        Ok(())
    }
}

impl VariableStore for MemoryStore {
    fn bind(&mut self, name: &str, value: Scalar, dtype: DataType) {
        tracing::trace!(name = %name, value = %value, dtype = %dtype, "bind");
        self.iteration.insert(name.to_string(), Rval::Scalar(value));
    }

    fn lookup(&self, name: &str) -> Option<(&Rval, DataType)> {
        if let Some(rval) = self.iteration.get(name) {
            return Some((rval, rval.data_type()));
        }

        if let Some(rval) = self.globals.get(name) {
            return Some((rval, rval.data_type()));
        }

        if mangle::is_mangled(name) {
            let plain = mangle::unmangle(name);
            tracing::trace!(alias = %name, name = %plain, "mangled lookup missed, retrying plain");
            if let Some(rval) = self.globals.get(&plain) {
                return Some((rval, rval.data_type()));
            }
        }

        None
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No variable files found in directory")]
    NoFilesFound,
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse variables file")]
    JsonParseFailed(#[from] serde_json::Error),
    #[error("Variable '{0}' is null")]
    NullValue(String),
}

/// Utility macro to create a [MemoryStore]
///
/// ```
/// # use crank::variables;
/// let store = variables! {
///     "host" => "alpha",
///     "ports" => [80, 443],
///     "limits" => { "cpu": 2, "mem": 512 },
/// };
/// ```
///
/// # Panic
/// Panics on a null value
///
/// ```should_panic
/// # use crank::variables;
/// variables! { "nothing" => null };
/// ```
#[macro_export]
macro_rules! variables {
    { $($name:expr => $value:tt),* $(,)? } => {{
        #[allow(unused_mut)]
        let mut store = $crate::store::MemoryStore::default();
        $(
            store
                .insert_json($name, ::serde_json::json!($value))
                .expect("variable value must not be null");
        )*
        store
    }};
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::value::Scalar;
    use pretty_assertions::assert_eq;

    #[test]
    fn iteration_scope_shadows_globals() {
        let mut store = MemoryStore::default();
        store.insert("host", Scalar::from("alpha"));

        store.bind("host", Scalar::from("beta"), DataType::String);

        let (rval, dtype) = store.lookup("host").unwrap();
        assert_eq!(rval, &Rval::Scalar(Scalar::from("beta")));
        assert_eq!(dtype, DataType::String);
    }

    #[test]
    fn mangled_lookup_falls_back_to_the_plain_name() {
        let store = variables! { "ns:scope.var" => ["a", "b"] };

        let (_, dtype) = store.lookup("ns*scope#var").unwrap();
        assert_eq!(dtype, DataType::StringList);
    }

    #[test]
    fn binding_an_alias_does_not_touch_the_plain_definition() {
        let mut store = variables! { "ns:scope.var" => ["a", "b"] };

        store.bind("ns*scope#var", Scalar::from("a"), DataType::String);

        let (rval, _) = store.lookup("ns:scope.var").unwrap();
        assert_eq!(
            rval,
            &Rval::List(vec![Scalar::from("a"), Scalar::from("b")])
        );
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let store = variables! {};
        assert_eq!(store.lookup("missing"), None);
    }
}
