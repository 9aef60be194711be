//! Java runtime discovery.
//!
//! The server is a Java application, so before anything is launched we
//! need a runnable `java` of a sufficient major version. `JAVA_HOME`
//! wins over whatever is on the PATH.

use crate::error::{NacosctlError, Result};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// A usable Java interpreter.
#[derive(Debug, Clone)]
pub struct JavaRuntime {
    pub path: PathBuf,
    pub major: u32,
}

/// Minimum Java major required by a given server major.
pub fn required_major(server_major: u32) -> u32 {
    if server_major >= 3 {
        17
    } else {
        8
    }
}

/// Finds a Java interpreter of at least `min_major`.
///
/// Candidates are `$JAVA_HOME/bin/java` then `java` from the PATH. The
/// first candidate that runs decides: a too-old `JAVA_HOME` fails
/// rather than falling through to the PATH.
pub async fn find_java(min_major: u32) -> Result<JavaRuntime> {
    for candidate in candidates() {
        let output = match Command::new(&candidate).arg("-version").output().await {
            Ok(out) => out,
            Err(e) => {
                debug!(candidate = %candidate.display(), error = %e, "java candidate did not run");
                continue;
            }
        };
        // java prints its version banner on stderr.
        let banner = if output.stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            String::from_utf8_lossy(&output.stderr).into_owned()
        };
        let Some(major) = parse_major(&banner) else {
            debug!(candidate = %candidate.display(), "unrecognized java version banner");
            continue;
        };
        if major < min_major {
            return Err(NacosctlError::Java(format!(
                "found Java {major} at {}, but this server version needs Java {min_major} or newer",
                candidate.display()
            )));
        }
        debug!(candidate = %candidate.display(), major, "java runtime selected");
        return Ok(JavaRuntime {
            path: candidate,
            major,
        });
    }
    Err(NacosctlError::Java(format!(
        "no Java runtime found; install Java {min_major} or newer, or set JAVA_HOME"
    )))
}

fn candidates() -> Vec<PathBuf> {
    let mut list = Vec::new();
    if let Ok(home) = std::env::var("JAVA_HOME") {
        if !home.is_empty() {
            list.push(PathBuf::from(home).join("bin").join("java"));
        }
    }
    list.push(PathBuf::from("java"));
    list
}

/// Extracts the major version from a `java -version` banner.
///
/// Handles both the legacy `1.8.0_311` scheme, where the major is the
/// second component, and the modern `17.0.2` / `21` scheme.
fn parse_major(banner: &str) -> Option<u32> {
    let quoted = banner.split('"').nth(1)?;
    let mut components = quoted.split('.');
    let first = components.next()?;
    if first == "1" {
        return components.next()?.parse().ok();
    }
    // Strip early-access suffixes like "21-ea".
    let digits: String = first.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
