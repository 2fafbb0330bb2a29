//! Notebook detection and remote naming
//!
//! A notebook is a source file whose first line is a language-specific marker
//! comment. Notebooks are stored remotely without their extension; every
//! other file keeps its local name.

use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::trace;

/// Maximum number of bytes read when sniffing for a marker
const SNIFF_LIMIT: u64 = 1024;

/// Returns the marker line expected for a file extension, if it has one
fn marker_for(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "py" | "r" => Some("# Databricks notebook source"),
        "scala" => Some("// Databricks notebook source"),
        "sql" => Some("-- Databricks notebook source"),
        _ => None,
    }
}

/// Returns true if the file at `path` starts with its language's notebook marker
///
/// Files without a notebook extension, unreadable files and files whose first
/// line is not valid text are not notebooks. Read failures never surface as
/// errors: such files are synchronized as plain files.
pub fn is_notebook(path: &Path) -> bool {
    let Some(marker) = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(marker_for)
    else {
        return false;
    };

    let mut head = Vec::with_capacity(SNIFF_LIMIT as usize);
    let read = fs::File::open(path).and_then(|file| file.take(SNIFF_LIMIT).read_to_end(&mut head));
    if let Err(e) = read {
        trace!(path = %path.display(), error = %e, "Cannot sniff file, treating as plain file");
        return false;
    }

    let first_line = head.split(|b| *b == b'\n').next().unwrap_or_default();
    let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);
    first_line == marker.as_bytes()
}

/// Computes the remote name of a root-relative local path
///
/// Notebooks lose their extension; everything else is unchanged.
pub fn remote_name(relative: &str, is_notebook: bool) -> String {
    if !is_notebook {
        return relative.to_string();
    }

    let (dir, name) = match relative.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, relative),
    };
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };

    match dir {
        Some(dir) => format!("{dir}/{stem}"),
        None => stem.to_string(),
    }
}
