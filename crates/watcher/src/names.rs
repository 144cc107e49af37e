//! Playlist name and video title extraction

use std::path::Path;

/// Name of the playlist a file belongs to: the base name of its parent directory.
///
/// Returns `None` when the path has no named parent (e.g. `/clip.mp4`).
pub fn playlist_name(path: &Path) -> Option<String> {
    path.parent().and_then(folder_name)
}

/// Base name of a directory path, used when the directory itself is new.
pub fn folder_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

/// Human-readable title: the part of `file_name` before the first `delimiter`.
///
/// Returns the whole name when the delimiter does not occur (or is empty).
/// Only the final path component is considered, so callers may pass a full path.
pub fn title<'a>(file_name: &'a str, delimiter: &str) -> &'a str {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);

    if delimiter.is_empty() {
        return base;
    }

    match base.split_once(delimiter) {
        Some((prefix, _)) => prefix,
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_playlist_name_is_parent_base_name() {
        assert_eq!(playlist_name(Path::new("/a/b/c.mp4")).as_deref(), Some("b"));
        assert_eq!(
            playlist_name(Path::new("/videos/Trip/clip1.mov")).as_deref(),
            Some("Trip")
        );
    }

    #[test]
    fn test_playlist_name_without_named_parent() {
        assert_eq!(playlist_name(Path::new("/clip.mp4")), None);
        assert_eq!(playlist_name(Path::new("clip.mp4")), None);
    }

    #[test]
    fn test_folder_name() {
        assert_eq!(folder_name(Path::new("/videos/Trip")).as_deref(), Some("Trip"));
        assert_eq!(folder_name(Path::new("/")), None);
    }

    #[test]
    fn test_title_splits_on_first_delimiter() {
        assert_eq!(title("movie.part1.mkv", "."), "movie");
        assert_eq!(title("noext", "."), "noext");
        assert_eq!(title("Holiday - Day 1 - Beach.mp4", " - "), "Holiday");
    }

    #[test]
    fn test_title_ignores_directory_portion() {
        let path = PathBuf::from("/videos/some.dir/clip1.mov");
        assert_eq!(title(path.to_str().unwrap(), "."), "clip1");
    }

    #[test]
    fn test_title_edge_cases() {
        assert_eq!(title(".hidden", "."), "");
        assert_eq!(title("clip.mov", ""), "clip.mov");
    }
}
