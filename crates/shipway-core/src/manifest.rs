//! In-place mutation of a deployment manifest's image reference.
//!
//! The manifest is an externally-owned text resource. The mutation is a
//! narrow single-line replace guarded by an exactly-one-match invariant:
//! after mutation, every line except the `image:` line is byte-identical
//! to before.

use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::image::ImageReference;

/// Outcome of a manifest mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The image line was rewritten to the new reference.
    Updated,
    /// The manifest already carried the new reference; nothing was written.
    Unchanged,
}

/// Rewrite the single `image:` line of the manifest at `path` to point at
/// `image`.
///
/// Fails with `NoImageLineFound` when zero or more than one line matches,
/// leaving the file unmodified. The write goes through a temp file in the
/// manifest's directory followed by a rename, so a crash mid-write never
/// leaves a torn manifest behind.
pub fn set_image(path: &Path, image: &ImageReference) -> Result<MutationOutcome> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::ManifestNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let rewritten = replace_image_line(&content, image, path)?;

    if rewritten == content {
        debug!(path = %path.display(), image = %image, "manifest already current");
        return Ok(MutationOutcome::Unchanged);
    }

    let dir = path.parent().ok_or_else(|| {
        PipelineError::InvalidInput(format!(
            "manifest path '{}' has no parent directory",
            path.display()
        ))
    })?;
    let tmp = NamedTempFile::new_in(dir)?;
    std::fs::write(tmp.path(), &rewritten)?;
    tmp.persist(path)
        .map_err(|e| PipelineError::Io(e.error))?;

    debug!(path = %path.display(), image = %image, "manifest image updated");
    Ok(MutationOutcome::Updated)
}

/// Replace the value of the single `image:` line, preserving every other
/// line and the trailing-newline shape of the document.
fn replace_image_line(content: &str, image: &ImageReference, path: &Path) -> Result<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let matches: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_image_line(line))
        .map(|(i, _)| i)
        .collect();

    if matches.len() != 1 {
        return Err(PipelineError::NoImageLineFound {
            path: path.to_path_buf(),
            matches: matches.len(),
        });
    }

    let idx = matches[0];
    let old = lines[idx];
    // Keep everything up to and including the key so indentation and a list
    // marker survive the rewrite.
    let key_end = old.find("image:").unwrap_or(0) + "image:".len();
    let new_line = format!("{} {}", &old[..key_end], image);

    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    out[idx] = new_line;
    Ok(out.join("\n"))
}

/// Whether a line carries the `image:` key, ignoring leading indentation and
/// a YAML list marker.
fn is_image_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    let trimmed = trimmed.strip_prefix("- ").unwrap_or(trimmed);
    trimmed.starts_with("image:")
}
