//! Capability-scoped reads of configuration files.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

/// Reads `path` as UTF-8 through a directory handle on its parent.
pub(crate) fn read_file(path: &Utf8Path) -> io::Result<String> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "configuration file path is missing a filename",
        )
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read_to_string(file_name)
}
