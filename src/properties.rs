//! Minimal editor for Java `.properties` files.
//!
//! The server ships `application.properties` files full of commented-out
//! defaults. Setting a key must reuse an existing active line, or
//! uncomment a commented one, before appending, so repeated
//! configuration passes stay idempotent.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Upserts `key=value` into the properties file at `path`.
///
/// Replaces the first active `key=` line if one exists, otherwise
/// uncomments and replaces the first commented `# key=` line, otherwise
/// appends. A missing file is created.
pub fn set_property(path: &Path, key: &str, value: &str) -> Result<()> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let replacement = format!("{key}={value}");

    if let Some(i) = lines.iter().position(|l| is_active_assignment(l, key)) {
        lines[i] = replacement;
    } else if let Some(i) = lines.iter().position(|l| is_commented_assignment(l, key)) {
        lines[i] = replacement;
    } else {
        lines.push(replacement);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, out)?;
    Ok(())
}

/// Reads the value of the first active `key=` line, if any.
///
/// Commented assignments do not count. A missing file reads as empty.
pub fn read_property(path: &Path, key: &str) -> Result<Option<String>> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    for line in text.lines() {
        if is_active_assignment(line, key) {
            let value = line
                .trim_start()
                .strip_prefix(key)
                .and_then(|rest| rest.trim_start().strip_prefix('='))
                .map(|v| v.trim().to_string());
            return Ok(value);
        }
    }
    Ok(None)
}

fn is_active_assignment(line: &str, key: &str) -> bool {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix(key) {
        Some(rest) => rest.trim_start().starts_with('='),
        None => false,
    }
}

fn is_commented_assignment(line: &str, key: &str) -> bool {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return false;
    }
    let uncommented = trimmed.trim_start_matches('#').trim_start();
    is_active_assignment(uncommented, key)
}
