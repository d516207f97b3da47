//! Shared path manipulation utilities.

use std::path::{Component, Path, PathBuf};

/// Collapse repeated slashes and drop a trailing slash, keeping a lone `/`.
///
/// Purely textual: the path does not need to exist, so `canonicalize` is not
/// an option here. `.` and `..` components are left in place.
pub fn clean_path(path: &str) -> String {
    let mut cleaned = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !previous_slash {
                cleaned.push(c);
            }
            previous_slash = true;
        } else {
            cleaned.push(c);
            previous_slash = false;
        }
    }
    if cleaned.len() > 1 && cleaned.ends_with('/') {
        cleaned.pop();
    }
    cleaned
}

/// Path of `path` relative to a fresh directory: only the named components.
///
/// Root, prefix, `.` and `..` components are dropped so that joining the
/// result onto a destination can never escape it.
pub fn contained_relative(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name),
            Component::Prefix(..)
            | Component::RootDir
            | Component::CurDir
            | Component::ParentDir => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_repeated_slashes() {
        assert_eq!(clean_path("a//b///c"), "a/b/c");
        assert_eq!(clean_path("//srv//media"), "/srv/media");
    }

    #[test]
    fn strips_trailing_slash_but_keeps_root() {
        assert_eq!(clean_path("music/"), "music");
        assert_eq!(clean_path("music///"), "music");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("///"), "/");
    }

    #[test]
    fn leaves_dots_alone() {
        assert_eq!(clean_path("./a/../b/"), "./a/../b");
        assert_eq!(clean_path(""), "");
    }

    #[test]
    fn contained_relative_drops_root_and_parent_components() {
        assert_eq!(
            contained_relative(Path::new("/home/me/song.ogg")),
            PathBuf::from("home/me/song.ogg")
        );
        assert_eq!(
            contained_relative(Path::new("../../etc/./passwd")),
            PathBuf::from("etc/passwd")
        );
        assert_eq!(
            contained_relative(Path::new("albums/a.flac")),
            PathBuf::from("albums/a.flac")
        );
    }
}
