// src/config/ini.rs
//! Hand-written INI reader/writer for the FastDFS configuration format.
//!
//! This is not a generic `ini`-style crate wrapper: the `#include`
//! resolution (relative to the including file's directory, or absolute, or
//! a URL) and duplicate-key, insertion-order-preserving semantics are
//! FastDFS-specific behaviors no off-the-shelf INI crate models.
//!
//! Lines before the first `[section]` header belong to the "global" section
//! (named `""`). A `[section]` header may repeat later in the same file (or
//! across an `#include`d file); repeats append to the same section rather
//! than creating a second one, preserving key order across the whole file.

use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

const GLOBAL_SECTION: &str = "";
const MAX_INCLUDE_DEPTH: usize = 16;

/// A parsed INI document: an ordered list of sections, each an ordered list
/// of (possibly duplicated) key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniContext {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl IniContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn section_mut(&mut self, name: &str) -> &mut Vec<(String, String)> {
        if let Some(idx) = self.sections.iter().position(|(n, _)| n == name) {
            &mut self.sections[idx].1
        } else {
            self.sections.push((name.to_string(), Vec::new()));
            &mut self.sections.last_mut().unwrap().1
        }
    }

    /// Appends `key = value` to `section` (creating it if absent), keeping
    /// any prior value for the same key — duplicates are preserved, not
    /// overwritten.
    pub fn push(&mut self, section: &str, key: &str, value: &str) {
        self.section_mut(section).push((key.to_string(), value.to_string()));
    }

    /// First value for `key` in `section`'s global scope (`""`), or any
    /// named section if `section` is given.
    pub fn get<'a>(&'a self, section: &str, key: &str) -> Option<&'a str> {
        self.sections
            .iter()
            .find(|(n, _)| n == section)
            .and_then(|(_, kvs)| kvs.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key` in `section`, in insertion order.
    pub fn get_all<'a>(&'a self, section: &str, key: &str) -> Vec<&'a str> {
        self.sections
            .iter()
            .find(|(n, _)| n == section)
            .map(|(_, kvs)| {
                kvs.iter()
                    .filter(|(k, _)| k == key)
                    .map(|(_, v)| v.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `get` against the global (no-header) section — where `max_connections`,
    /// `work_threads`, and the other top-level keys live.
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.get(GLOBAL_SECTION, key)
    }

    /// Section names in first-seen order, global section included if
    /// non-empty (named `""`).
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }

    /// Parses `text` with no `#include` resolution (no base directory to
    /// resolve relative includes against) — an `#include` line in `text`
    /// is an error. Use [`IniContext::load_file`] when includes are needed.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let mut ctx = Self::new();
        let mut current = GLOBAL_SECTION.to_string();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                if line.starts_with("#include") {
                    return Err(CoreError::InvalidArgument(format!(
                        "line {}: #include requires loading via IniContext::load_file",
                        lineno + 1
                    )));
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = rest.trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(CoreError::InvalidArgument(format!(
                    "line {}: expected key = value, got {line:?}",
                    lineno + 1
                )));
            };
            ctx.push(&current, key.trim(), value.trim());
        }
        Ok(ctx)
    }

    /// Loads `path`, resolving `#include <target>` lines recursively.
    /// `target` is resolved, in order: as an absolute path; as a URL
    /// (`http://`/`https://` — this core does not fetch over the network,
    /// so a URL include is an `InvalidArgument` error rather than silently
    /// skipped); otherwise relative to `path`'s own directory.
    pub fn load_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let mut ctx = Self::new();
        let mut current = GLOBAL_SECTION.to_string();
        Self::load_into(path.as_ref(), &mut ctx, &mut current, 0)?;
        Ok(ctx)
    }

    fn load_into(path: &Path, ctx: &mut Self, current: &mut String, depth: usize) -> CoreResult<()> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(CoreError::InvalidArgument(format!(
                "#include nesting exceeds {MAX_INCLUDE_DEPTH} levels (possible cycle) at {path:?}"
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::InvalidArgument(format!("reading {path:?}: {e}")))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(target) = line.strip_prefix("#include") {
                let target = target.trim();
                if target.is_empty() {
                    return Err(CoreError::InvalidArgument(format!(
                        "{path:?} line {}: #include with no target",
                        lineno + 1
                    )));
                }
                if target.starts_with("http://") || target.starts_with("https://") {
                    return Err(CoreError::InvalidArgument(format!(
                        "{path:?} line {}: URL includes are not fetched by this core: {target}",
                        lineno + 1
                    )));
                }
                let included = if Path::new(target).is_absolute() {
                    PathBuf::from(target)
                } else {
                    base_dir.join(target)
                };
                Self::load_into(&included, ctx, current, depth + 1)?;
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                *current = rest.trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(CoreError::InvalidArgument(format!(
                    "{path:?} line {}: expected key = value, got {line:?}",
                    lineno + 1
                )));
            };
            ctx.push(current, key.trim(), value.trim());
        }
        Ok(())
    }

    /// Renders back to INI text. `load(dump(ctx))` preserves (section, key,
    /// values-in-insertion-order) for the union of all sections — `#include`
    /// directives are never emitted since by dump time they have already
    /// been expanded into `self`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (name, kvs) in &self.sections {
            if !name.is_empty() {
                out.push_str(&format!("[{name}]\n"));
            }
            for (k, v) in kvs {
                out.push_str(&format!("{k} = {v}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_keys_and_duplicates_in_order() {
        let ctx = IniContext::parse("max_connections = 256\nwork_threads = 4\nwork_threads = 8\n").unwrap();
        assert_eq!(ctx.get_global("max_connections"), Some("256"));
        assert_eq!(ctx.get_all(GLOBAL_SECTION, "work_threads"), vec!["4", "8"]);
    }

    #[test]
    fn repeated_section_header_appends_to_same_section() {
        let text = "[group1]\nip = 10.0.0.1\n[group1]\nip = 10.0.0.2\n";
        let ctx = IniContext::parse(text).unwrap();
        assert_eq!(ctx.get_all("group1", "ip"), vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(ctx.section_names().filter(|n| *n == "group1").count(), 1);
    }

    #[test]
    fn dump_then_parse_round_trips() {
        let mut ctx = IniContext::new();
        ctx.push(GLOBAL_SECTION, "max_connections", "256");
        ctx.push("group1", "ip", "10.0.0.1");
        ctx.push("group1", "ip", "10.0.0.2");
        ctx.push("group2", "ip", "10.0.0.3");

        let dumped = ctx.dump();
        let reparsed = IniContext::parse(&dumped).unwrap();
        assert_eq!(reparsed, ctx);
    }

    #[test]
    fn plain_parse_rejects_include_directive() {
        assert!(IniContext::parse("#include other.conf\n").is_err());
    }

    #[test]
    fn load_file_resolves_relative_include() {
        let dir = std::env::temp_dir().join(format!(
            "fdfs-ini-test-{}-{}",
            std::process::id(),
            "relative_include"
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let included = dir.join("included.conf");
        std::fs::write(&included, "network_timeout = 30\n").unwrap();
        let main = dir.join("main.conf");
        std::fs::write(&main, "max_connections = 256\n#include included.conf\n").unwrap();

        let ctx = IniContext::load_file(&main).unwrap();
        assert_eq!(ctx.get_global("max_connections"), Some("256"));
        assert_eq!(ctx.get_global("network_timeout"), Some("30"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_file_rejects_url_include() {
        let dir = std::env::temp_dir().join(format!(
            "fdfs-ini-test-{}-{}",
            std::process::id(),
            "url_include"
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let main = dir.join("main.conf");
        std::fs::write(&main, "#include http://example.com/shared.conf\n").unwrap();

        assert!(IniContext::load_file(&main).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
