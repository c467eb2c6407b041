//! Path classification: metadata, checksums and maven artifact layout.
//!
//! Metadata paths (repository indexes and checksum files) are never
//! promoted or validated; they are always reported as skipped.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static MAVEN_METADATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:.*/)?maven-metadata\.xml(?:\.(?:md5|sha[0-9]+))?$")
        .expect("maven-metadata pattern is valid")
});

static CHECKSUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*\.(?:md5|sha[0-9]+)$").expect("checksum pattern is valid"));

/// True for checksum files (`.md5`, `.sha1`, `.sha256`, ...).
pub fn is_checksum(path: &str) -> bool {
    CHECKSUM.is_match(path)
}

/// True for repository metadata: `maven-metadata.xml` (and its checksums)
/// or any checksum file.
pub fn is_metadata(path: &str) -> bool {
    MAVEN_METADATA.is_match(path) || is_checksum(path)
}

/// Split paths into `(pending, metadata)`.
pub fn partition_metadata<'a, I>(paths: I) -> (BTreeSet<String>, BTreeSet<String>)
where
    I: IntoIterator<Item = &'a String>,
{
    paths
        .into_iter()
        .cloned()
        .partition(|path| !is_metadata(path))
}

/// Coordinates parsed from a maven-layout path
/// (`group/as/dirs/artifactId/version/filename`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub filename: String,
}

impl ArtifactRef {
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with("-SNAPSHOT")
    }
}

/// Parse a maven-layout path. Returns `None` for paths that are too short
/// to carry group, artifact, version and filename.
pub fn parse_artifact_path(path: &str) -> Option<ArtifactRef> {
    let segments: Vec<&str> = path
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() < 4 {
        return None;
    }
    let n = segments.len();
    Some(ArtifactRef {
        group_id: segments[..n - 3].join("."),
        artifact_id: segments[n - 3].to_string(),
        version: segments[n - 2].to_string(),
        filename: segments[n - 1].to_string(),
    })
}
