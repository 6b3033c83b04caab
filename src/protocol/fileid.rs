// src/protocol/fileid.rs
//! File identifiers: `group/path` strings, where the path follows
//! `HH/HH/name.ext` with uppercase hex directory components.

use crate::error::{CoreError, CoreResult};

/// A parsed `group/path` file identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileId {
    pub group: String,
    pub path: String,
}

fn is_uppercase_hex_pair(s: &str) -> bool {
    s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

impl FileId {
    /// Parses `"group/HH/HH/name.ext"`. `InvalidArgument` if the group is
    /// empty, the path is missing, or the leading two directory components
    /// are not two uppercase-hex characters each.
    pub fn parse(s: &str) -> CoreResult<Self> {
        let Some((group, path)) = s.split_once('/') else {
            return Err(CoreError::InvalidArgument(format!(
                "file id {s:?} has no group/path separator"
            )));
        };
        if group.is_empty() {
            return Err(CoreError::InvalidArgument("file id has empty group".into()));
        }
        if path.is_empty() {
            return Err(CoreError::InvalidArgument("file id has empty path".into()));
        }

        let mut parts = path.splitn(3, '/');
        let dir1 = parts.next().unwrap_or("");
        let dir2 = parts.next().unwrap_or("");
        let name = parts.next().unwrap_or("");
        if !is_uppercase_hex_pair(dir1) || !is_uppercase_hex_pair(dir2) || name.is_empty() {
            return Err(CoreError::InvalidArgument(format!(
                "path {path:?} does not match HH/HH/name.ext"
            )));
        }

        Ok(Self {
            group: group.to_string(),
            path: path.to_string(),
        })
    }

    /// Reassembles the `group/path` string.
    pub fn to_id_string(&self) -> String {
        format!("{}/{}", self.group, self.path)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_id_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_file_id() {
        let id = FileId::parse("group1/0A/1F/abcdef1234.txt").unwrap();
        assert_eq!(id.group, "group1");
        assert_eq!(id.path, "0A/1F/abcdef1234.txt");
        assert_eq!(id.to_id_string(), "group1/0A/1F/abcdef1234.txt");
    }

    #[test]
    fn rejects_lowercase_hex_directories() {
        assert!(FileId::parse("group1/0a/1f/name.txt").is_err());
    }

    #[test]
    fn rejects_missing_separator_or_empty_group() {
        assert!(FileId::parse("no-slash-here").is_err());
        assert!(FileId::parse("/0A/1F/name.txt").is_err());
    }

    #[test]
    fn rejects_missing_filename() {
        assert!(FileId::parse("group1/0A/1F/").is_err());
    }
}
