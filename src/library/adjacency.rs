//! Sibling navigation within a directory.

use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;

use crate::library::kind::classify;
use crate::library::root::MediaPath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sibling {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjacent {
    pub prev: Option<Sibling>,
    pub next: Option<Sibling>,
}

/// Directory order: case-insensitive by name, ties broken by byte order.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.as_bytes().cmp(b.as_bytes()))
}

/// Pick the neighbours of `current` from an unordered list of sibling names.
///
/// Returns `None` when `current` is not among `names`.
pub fn neighbours(mut names: Vec<String>, current: &str) -> Option<(Option<String>, Option<String>)> {
    names.sort_by(|a, b| compare_names(a, b));
    let pos = names.iter().position(|n| n == current)?;

    let prev = pos.checked_sub(1).map(|i| names[i].clone());
    let next = names.get(pos + 1).cloned();
    Some((prev, next))
}

/// Find the previous/next file of the same media kind next to `media`.
///
/// Blocking; call from a blocking context.
pub fn adjacent(media: &MediaPath) -> std::io::Result<Adjacent> {
    let kind = media.file_type();
    let dir = media
        .requested()
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no parent directory"))?;

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if kind.is_some() && classify(Path::new(&name)) == kind {
            names.push(name);
        }
    }

    let (prev, next) = neighbours(names, media.file_name()).unwrap_or((None, None));
    let parent = media.parent_key();
    let sibling = |name: String| Sibling {
        path: if parent.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", parent, name)
        },
        name,
    };

    Ok(Adjacent {
        prev: prev.map(sibling),
        next: next.map(sibling),
    })
}
