//! Folder scanning for data sources.
//!
//! Lists the files directly inside a kind's folder, keeps the ones whose
//! file name matches the kind's globs and returns them sorted by file
//! name, so tool numbering is reproducible across runs and platforms.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::{DataSource, SourceKind};

/// Scan the configured folder for `kind`. A missing folder yields no sources.
pub fn scan_sources(config: &Config, kind: SourceKind) -> Result<Vec<DataSource>> {
    scan_folder(&config.data.folder(kind), config.data.globs(kind), kind)
}

pub fn scan_folder(folder: &Path, globs: &[String], kind: SourceKind) -> Result<Vec<DataSource>> {
    if !folder.exists() {
        tracing::warn!(folder = %folder.display(), "{} folder does not exist", kind);
        return Ok(Vec::new());
    }

    let include_set = build_globset(globs)?;

    let mut sources = Vec::new();
    let walker = WalkDir::new(folder).min_depth(1).max_depth(1);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !include_set.is_match(&name) {
            continue;
        }

        sources.push(DataSource::new(entry.path(), kind));
    }

    sources.sort_by_key(|s| s.file_name());

    if kind == SourceKind::Document {
        sources = drop_duplicate_stems(sources);
    }

    Ok(sources)
}

/// Document indices are keyed by stem, so two files sharing one
/// (`canada.md`, `canada.txt`) cannot both be indexed. The first in name
/// order wins.
fn drop_duplicate_stems(sources: Vec<DataSource>) -> Vec<DataSource> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|source| {
            if seen.insert(source.logical_name.clone()) {
                return true;
            }
            tracing::warn!(
                file = %source.path.display(),
                index = %source.logical_name,
                "skipping document: another file already uses this index name"
            );
            false
        })
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn matching_files_sorted_and_others_ignored() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("zeta.csv"), "a\n1\n").unwrap();
        fs::write(dir.join("readme.md"), "ignore me").unwrap();
        fs::write(dir.join("alpha.csv"), "a\n1\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignore me").unwrap();
        fs::create_dir(dir.join("nested.csv")).unwrap();

        let found = scan_folder(dir, &["*.csv".to_string()], SourceKind::Tabular).unwrap();
        let names: Vec<String> = found.iter().map(|s| s.file_name()).collect();
        assert_eq!(names, vec!["alpha.csv", "zeta.csv"]);
        assert_eq!(found[0].logical_name, "alpha");
    }

    #[test]
    fn missing_folder_is_empty() {
        let tmp = TempDir::new().unwrap();
        let found = scan_folder(
            &tmp.path().join("absent"),
            &["*.pdf".to_string()],
            SourceKind::Document,
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn documents_sharing_a_stem_keep_only_the_first() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("canada.md"), "Maple syrup comes from Quebec.").unwrap();
        fs::write(dir.join("canada.txt"), "Ottawa is the capital.").unwrap();
        fs::write(dir.join("peru.txt"), "Lima is the capital.").unwrap();

        let globs = ["*.md".to_string(), "*.txt".to_string()];
        let found = scan_folder(dir, &globs, SourceKind::Document).unwrap();
        let names: Vec<String> = found.iter().map(|s| s.file_name()).collect();
        assert_eq!(names, vec!["canada.md", "peru.txt"]);
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_folder(tmp.path(), &["[".to_string()], SourceKind::Tabular).is_err());
    }
}
