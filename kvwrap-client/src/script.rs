//! # Script Cache
//!
//! Maps caller-chosen aliases to scripts the server has cached, so that
//! `cmd("alias", args)` is dispatched as `EVALSHA <hash> <key_count> args...`.
//!
//! Entries are only added after the server returned a well-formed hash and are
//! never changed afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::convert::Args;
use crate::error::ScriptLoadError;

/// Length of the hex digest the server returns for a loaded script.
pub const SCRIPT_HASH_LENGTH: usize = 40;

/// Command used to invoke a cached script by its hash.
pub const INVOKE_BY_HASH: &str = "EVALSHA";

/// True when `hash` has the shape of a script digest.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == SCRIPT_HASH_LENGTH && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Server-side digest of a script and how many leading arguments are keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    hash: String,
    key_count: usize,
}

impl ScriptEntry {
    /// Entry for a loaded script.
    pub fn new(hash: impl Into<String>, key_count: usize) -> Self {
        ScriptEntry {
            hash: hash.into(),
            key_count,
        }
    }

    /// Content hash returned by the server.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Number of leading arguments passed as keys.
    pub fn key_count(&self) -> usize {
        self.key_count
    }
}

/// Alias → script table for one connection.
#[derive(Debug, Clone, Default)]
pub struct ScriptCache {
    entries: HashMap<String, ScriptEntry>,
}

impl ScriptCache {
    /// Empty alias table.
    pub fn new() -> Self {
        ScriptCache::default()
    }

    /// Entry registered under `alias`.
    pub fn get(&self, alias: &str) -> Option<&ScriptEntry> {
        self.entries.get(alias)
    }

    /// True if `alias` is registered.
    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Number of registered aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no alias is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered aliases, in no particular order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Registers an alias. An alias that is already taken keeps its entry.
    pub fn insert(&mut self, alias: &str, entry: ScriptEntry) -> Result<(), ScriptLoadError> {
        if self.contains(alias) {
            return Err(ScriptLoadError::AliasTaken(alias.to_string()));
        }
        self.entries.insert(alias.to_string(), entry);
        Ok(())
    }

    /// Builds the argument vector for `name`: the invoke-by-hash form when
    /// `name` is a registered alias, `name` verbatim otherwise.
    pub fn resolve(&self, name: &str, args: Args) -> Vec<String> {
        let args = args.into_vec();
        match self.entries.get(name) {
            Some(entry) => {
                let mut argv = Vec::with_capacity(args.len() + 3);
                argv.push(INVOKE_BY_HASH.to_string());
                argv.push(entry.hash.clone());
                argv.push(entry.key_count.to_string());
                argv.extend(args);
                argv
            }
            None => {
                let mut argv = Vec::with_capacity(args.len() + 1);
                argv.push(name.to_string());
                argv.extend(args);
                argv
            }
        }
    }
}

/// Where a script's body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// The script text itself.
    Inline(String),
    /// A file whose contents are sent verbatim. The file must be valid
    /// UTF-8; anything else is rejected as a read error.
    File(PathBuf),
}

impl ScriptSource {
    /// Script given as text.
    pub fn inline(body: impl Into<String>) -> Self {
        ScriptSource::Inline(body.into())
    }

    /// Script read from `path` when it is loaded.
    pub fn file(path: impl AsRef<Path>) -> Self {
        ScriptSource::File(path.as_ref().to_path_buf())
    }

    /// Returns the script body.
    pub fn read(&self, alias: &str) -> Result<String, ScriptLoadError> {
        match self {
            ScriptSource::Inline(body) => Ok(body.clone()),
            ScriptSource::File(path) => fs::read_to_string(path).map_err(|source| ScriptLoadError::Read {
                alias: alias.to_string(),
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

/// Shared "server scripts already flushed" flag.
///
/// Flushing the server's script cache affects every client, so it is
/// attempted at most once per guard no matter how many connections share it.
/// [`ScriptFlushGuard::process`] hands out the guard shared by the whole
/// process; tests and embedders may create isolated guards with `new`.
#[derive(Debug, Clone, Default)]
pub struct ScriptFlushGuard {
    flushed: Arc<AtomicBool>,
}

impl ScriptFlushGuard {
    /// Guard private to its clones, not shared with `process()`.
    pub fn new() -> Self {
        ScriptFlushGuard::default()
    }

    /// The guard shared by every connection in this process.
    pub fn process() -> Self {
        static PROCESS: OnceLock<ScriptFlushGuard> = OnceLock::new();
        PROCESS.get_or_init(ScriptFlushGuard::new).clone()
    }

    /// Claims the single flush attempt. Returns false if it was already used.
    pub fn try_claim(&self) -> bool {
        self.flushed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// True once a flush has been attempted under this guard.
    pub fn is_claimed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::IntoArgs;

    const HASH: &str = "e0e1f9fabfc9d4800c877a703b823ac0578ff8db";

    #[test]
    fn validates_hash_shape() {
        assert!(is_valid_hash(HASH));
        assert!(!is_valid_hash("abc"));
        assert!(!is_valid_hash(&"z".repeat(SCRIPT_HASH_LENGTH)));
        assert!(!is_valid_hash(&format!("{}0", HASH)));
    }

    #[test]
    fn resolves_alias_to_invoke_by_hash() {
        let mut cache = ScriptCache::new();
        cache.insert("incr_by", ScriptEntry::new(HASH, 1)).unwrap();
        let argv = cache.resolve("incr_by", ("counter", 5).into_args());
        assert_eq!(argv, vec![INVOKE_BY_HASH, HASH, "1", "counter", "5"]);
    }

    #[test]
    fn unknown_name_is_dispatched_verbatim() {
        let cache = ScriptCache::new();
        let argv = cache.resolve("GET", "key".into_args());
        assert_eq!(argv, vec!["GET", "key"]);
    }

    #[test]
    fn alias_is_never_replaced() {
        let mut cache = ScriptCache::new();
        cache.insert("s", ScriptEntry::new(HASH, 0)).unwrap();
        let err = cache.insert("s", ScriptEntry::new("0".repeat(40), 2)).unwrap_err();
        assert!(matches!(err, ScriptLoadError::AliasTaken(alias) if alias == "s"));
        assert_eq!(cache.get("s").map(ScriptEntry::key_count), Some(0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn flush_guard_is_claimed_once_across_clones() {
        let guard = ScriptFlushGuard::new();
        let other = guard.clone();
        assert!(!other.is_claimed());
        assert!(guard.try_claim());
        assert!(!other.try_claim());
        assert!(other.is_claimed());
        assert!(ScriptFlushGuard::new().try_claim());
    }

    #[test]
    fn missing_script_file_is_a_read_error() {
        let source = ScriptSource::file("/definitely/not/here.lua");
        assert!(matches!(source.read("s"), Err(ScriptLoadError::Read { .. })));
        assert_eq!(ScriptSource::inline("return 1").read("s").unwrap(), "return 1");
    }
}
