//! Artifact scanner: turns classpath roots into the run's unit list.
//!
//! Roots are directories (searched for `.class` files and JARs) or JAR files
//! given directly. The scan is restartable and order-stable: units are listed
//! in root order, walking each root in sorted path order, and a qualified
//! name seen twice keeps its first occurrence.

use crate::model::{RunError, RunErrorKind, UnitDescriptor, UnitOrigin};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use xxhash_rust::xxh3::Xxh3;
use zip::ZipArchive;

pub struct ScanOutcome {
    pub units: Vec<UnitDescriptor>,
    pub errors: Vec<RunError>,
}

pub fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.write(bytes);
    hasher.finish()
}

/// Read one unit's bytes back from its origin.
pub fn read_unit_bytes(origin: &UnitOrigin) -> io::Result<Vec<u8>> {
    match origin {
        UnitOrigin::ClassFile { path } => fs::read(path),
        UnitOrigin::JarEntry { archive, entry } => {
            let file = File::open(archive)?;
            let mut zip = ZipArchive::new(file).map_err(io::Error::other)?;
            let mut entry = zip.by_name(entry).map_err(io::Error::other)?;
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// One scan candidate, in classpath order.
enum Candidate {
    /// A loose classfile under a directory root.
    Loose { root: PathBuf, path: PathBuf },
    Jar(PathBuf),
}

pub struct Scanner;

impl Scanner {
    pub fn scan(roots: &[PathBuf]) -> ScanOutcome {
        let mut errors = Vec::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for root in roots {
            if root.is_dir() {
                Self::walk_root(root, &mut candidates, &mut errors);
            } else if root.is_file() {
                match extension(root) {
                    Some("jar") => candidates.push(Candidate::Jar(root.clone())),
                    Some("class") => candidates.push(Candidate::Loose {
                        root: root.parent().map(Path::to_path_buf).unwrap_or_default(),
                        path: root.clone(),
                    }),
                    _ => errors.push(RunError::new(
                        RunErrorKind::Scan,
                        root.display().to_string(),
                        "root is neither a directory, a JAR, nor a class file",
                    )),
                }
            } else {
                errors.push(RunError::new(
                    RunErrorKind::Scan,
                    root.display().to_string(),
                    "root is unreadable or does not exist",
                ));
            }
        }

        // Hash loose files in parallel, then assemble units back in
        // candidate order so root order decides classpath shadowing.
        let hashed: Vec<Option<Result<UnitDescriptor, RunError>>> = candidates
            .par_iter()
            .map(|candidate| match candidate {
                Candidate::Loose { root, path } => Some(match fs::read(path) {
                    Ok(bytes) => Ok(UnitDescriptor {
                        qualified_name: qualified_name_of(root, path),
                        origin: UnitOrigin::ClassFile { path: path.clone() },
                        fingerprint: fingerprint(&bytes),
                    }),
                    Err(err) => Err(RunError::new(
                        RunErrorKind::Scan,
                        path.display().to_string(),
                        err.to_string(),
                    )),
                }),
                Candidate::Jar(_) => None,
            })
            .collect();

        let mut units = Vec::with_capacity(hashed.len());
        for (candidate, hash) in candidates.iter().zip(hashed) {
            match (candidate, hash) {
                (Candidate::Loose { .. }, Some(Ok(unit))) => units.push(unit),
                (Candidate::Loose { .. }, Some(Err(err))) => errors.push(err),
                (Candidate::Jar(jar), _) => Self::scan_jar(jar, &mut units, &mut errors),
                (Candidate::Loose { .. }, None) => unreachable!(),
            }
        }

        // First-seen wins across roots; classpath shadowing semantics.
        let mut seen = BTreeSet::new();
        let mut deduped = Vec::with_capacity(units.len());
        for unit in units {
            if seen.insert(unit.qualified_name.clone()) {
                deduped.push(unit);
            } else {
                tracing::debug!(
                    unit = %unit.qualified_name,
                    origin = ?unit.origin.artifact(),
                    "shadowed duplicate unit skipped"
                );
            }
        }

        tracing::info!(
            units = deduped.len(),
            errors = errors.len(),
            "classpath scan complete"
        );
        ScanOutcome {
            units: deduped,
            errors,
        }
    }

    fn walk_root(root: &Path, candidates: &mut Vec<Candidate>, errors: &mut Vec<RunError>) {
        for entry in WalkDir::new(root).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.path();
                    match extension(path) {
                        Some("class") => candidates.push(Candidate::Loose {
                            root: root.to_path_buf(),
                            path: path.to_path_buf(),
                        }),
                        Some("jar") => candidates.push(Candidate::Jar(path.to_path_buf())),
                        _ => {}
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    let subject = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    errors.push(RunError::new(RunErrorKind::Scan, subject, err.to_string()));
                }
            }
        }
    }

    fn scan_jar(jar: &Path, units: &mut Vec<UnitDescriptor>, errors: &mut Vec<RunError>) {
        let archive = File::open(jar).and_then(|file| {
            ZipArchive::new(file).map_err(io::Error::other)
        });
        let mut archive = match archive {
            Ok(archive) => archive,
            Err(err) => {
                errors.push(RunError::new(
                    RunErrorKind::Scan,
                    jar.display().to_string(),
                    err.to_string(),
                ));
                return;
            }
        };

        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| name.ends_with(".class") && !name.ends_with("module-info.class"))
            .map(str::to_string)
            .collect();
        names.sort();

        for name in names {
            let bytes = archive.by_name(&name).map_err(io::Error::other).and_then(
                |mut entry| {
                    let mut buf = Vec::with_capacity(entry.size() as usize);
                    entry.read_to_end(&mut buf)?;
                    Ok(buf)
                },
            );
            match bytes {
                Ok(bytes) => units.push(UnitDescriptor {
                    qualified_name: name
                        .trim_end_matches(".class")
                        .replace('/', "."),
                    origin: UnitOrigin::JarEntry {
                        archive: jar.to_path_buf(),
                        entry: name,
                    },
                    fingerprint: fingerprint(&bytes),
                }),
                Err(err) => errors.push(RunError::new(
                    RunErrorKind::Scan,
                    format!("{}!{}", jar.display(), name),
                    err.to_string(),
                )),
            }
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn qualified_name_of(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let stem = rel.with_extension("");
    stem.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_follow_the_package_layout() {
        let root = Path::new("/tmp/classes");
        let path = Path::new("/tmp/classes/com/example/A.class");
        assert_eq!(qualified_name_of(root, path), "com.example.A");
    }

    #[test]
    fn fingerprints_are_content_addressed() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
    }
}
