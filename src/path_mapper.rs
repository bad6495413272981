//! Note path → asset directory mapping
//!
//! The mapping is a pure function of the note's path relative to the notes
//! root:
//!
//! - `root.md`           → `root`
//! - `dsa/sort.md`       → `dsa.assets/sort`
//! - `dsa/anal/iter.md`  → `dsa.assets/anal/iter`
//!
//! The first segment of a nested note gets the category suffix, so the
//! assets of `dsa/intro.md` never collide with a root-level note `dsa.md`.

use std::path::{Component, Path, PathBuf};

use crate::constants as C;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PathMapper {
    suffix: String,
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new(C::CATEGORY_SUFFIX)
    }
}

impl PathMapper {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Map a note path relative to the notes root to its asset directory
    /// relative to the assets root
    ///
    /// Fails with `OutOfScope` for absolute paths, paths climbing out with
    /// `..`, and empty paths.
    pub fn map(&self, relative_note: &Path) -> Result<PathBuf> {
        let segments = Self::segments(relative_note)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| Error::OutOfScope(relative_note.to_path_buf()))?;

        let stem = Path::new(last)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| last.clone());

        let mut mapped = PathBuf::new();
        for (index, segment) in parents.iter().enumerate() {
            if index == 0 {
                mapped.push(format!("{}{}", segment, self.suffix));
            } else {
                mapped.push(segment);
            }
        }
        mapped.push(stem);
        Ok(mapped)
    }

    /// Map an absolute note path to an absolute asset directory
    pub fn map_absolute(&self, notes_root: &Path, assets_root: &Path, note: &Path) -> Result<PathBuf> {
        let relative = note
            .strip_prefix(notes_root)
            .map_err(|_| Error::OutOfScope(note.to_path_buf()))?;
        Ok(assets_root.join(self.map(relative)?))
    }

    /// Inverse mapping: asset directory (relative) → note path without extension
    pub fn note_stem_for(&self, relative_asset: &Path) -> Result<PathBuf> {
        let segments = Self::segments(relative_asset)?;
        if segments.len() == 1 {
            return Ok(PathBuf::from(&segments[0]));
        }
        let mut stem = PathBuf::new();
        for (index, segment) in segments.iter().enumerate() {
            if index == 0 {
                let category = segment
                    .strip_suffix(&self.suffix)
                    .ok_or_else(|| Error::OutOfScope(relative_asset.to_path_buf()))?;
                stem.push(category);
            } else {
                stem.push(segment);
            }
        }
        Ok(stem)
    }

    /// Whether a relative asset path has the shape this mapper produces:
    /// one segment, or a suffixed first segment
    pub fn is_conforming(&self, relative_asset: &Path) -> bool {
        match Self::segments(relative_asset) {
            Ok(segments) if segments.len() == 1 => true,
            Ok(segments) => segments[0].ends_with(&self.suffix) && segments[0].len() > self.suffix.len(),
            Err(_) => false,
        }
    }

    fn segments(path: &Path) -> Result<Vec<String>> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::CurDir => continue,
                _ => return Err(Error::OutOfScope(path.to_path_buf())),
            }
        }
        if segments.is_empty() {
            return Err(Error::OutOfScope(path.to_path_buf()));
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_level_note() {
        let mapper = PathMapper::default();
        assert_eq!(mapper.map(Path::new("root.md")).unwrap(), PathBuf::from("root"));
    }

    #[test]
    fn test_nested_note_gets_category_suffix() {
        let mapper = PathMapper::default();
        assert_eq!(
            mapper.map(Path::new("dsa/anal/iter.md")).unwrap(),
            PathBuf::from("dsa.assets/anal/iter")
        );
        assert_eq!(mapper.map(Path::new("dsa/sort.md")).unwrap(), PathBuf::from("dsa.assets/sort"));
    }

    #[test]
    fn test_map_is_deterministic() {
        let mapper = PathMapper::default();
        let note = Path::new("lang/rust/ownership.md");
        assert_eq!(mapper.map(note).unwrap(), mapper.map(note).unwrap());
    }

    #[test]
    fn test_same_leaf_in_different_categories() {
        let mapper = PathMapper::default();
        let python = mapper.map(Path::new("python/intro.md")).unwrap();
        let js = mapper.map(Path::new("javascript/intro.md")).unwrap();
        let root = mapper.map(Path::new("intro.md")).unwrap();
        assert_ne!(python, js);
        assert_ne!(python, root);
        assert_eq!(root, PathBuf::from("intro"));
    }

    #[test]
    fn test_category_does_not_collide_with_root_note() {
        let mapper = PathMapper::default();
        // dsa.md vs dsa/intro.md
        let root_note = mapper.map(Path::new("dsa.md")).unwrap();
        let nested = mapper.map(Path::new("dsa/intro.md")).unwrap();
        assert_eq!(root_note, PathBuf::from("dsa"));
        assert!(!nested.starts_with(&root_note));
    }

    #[test]
    fn test_out_of_scope() {
        let mapper = PathMapper::default();
        assert!(matches!(mapper.map(Path::new("../x.md")), Err(Error::OutOfScope(_))));
        assert!(matches!(mapper.map(Path::new("")), Err(Error::OutOfScope(_))));
        #[cfg(unix)]
        assert!(matches!(mapper.map(Path::new("/abs/x.md")), Err(Error::OutOfScope(_))));
    }

    #[test]
    fn test_map_absolute() {
        let mapper = PathMapper::default();
        let mapped = mapper
            .map_absolute(Path::new("/n"), Path::new("/a"), Path::new("/n/dsa/anal/iter.md"))
            .unwrap();
        assert_eq!(mapped, PathBuf::from("/a/dsa.assets/anal/iter"));

        let outside = mapper.map_absolute(Path::new("/n"), Path::new("/a"), Path::new("/other/x.md"));
        assert!(matches!(outside, Err(Error::OutOfScope(_))));
    }

    #[test]
    fn test_note_stem_for_inverts_map() {
        let mapper = PathMapper::default();
        for note in ["root.md", "dsa/sort.md", "dsa/anal/iter.md"] {
            let mapped = mapper.map(Path::new(note)).unwrap();
            let stem = mapper.note_stem_for(&mapped).unwrap();
            assert_eq!(stem, Path::new(note).with_extension(""));
        }
        assert!(mapper.note_stem_for(Path::new("dsa/anal")).is_err());
    }

    #[test]
    fn test_is_conforming() {
        let mapper = PathMapper::default();
        assert!(mapper.is_conforming(Path::new("root")));
        assert!(mapper.is_conforming(Path::new("dsa.assets/anal/iter")));
        assert!(!mapper.is_conforming(Path::new("dsa/anal/iter")));
        assert!(!mapper.is_conforming(Path::new(".assets/x")));
    }
}
