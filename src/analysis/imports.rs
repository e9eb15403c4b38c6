// Module identities and import resolution
//
// Everything here is string matching over dotted names. There is no module
// search path, no aliasing and no namespace-package handling: an import is
// internal when it is relative or starts with the configured package root.

use crate::parser::ImportClass;
use std::collections::BTreeSet;
use std::path::Path;

const SOURCE_EXTENSIONS: [&str; 3] = [".py", ".pyi", ".pyw"];

/// Identity of a top-level `__init__.py` when no package root names it
pub const ROOT_INIT_MODULE: &str = "__init__";

/// Dotted module identity for a path relative to the analysis root.
///
/// `pkg/__init__.py` names the package itself. When a package root is given it
/// prefixes the identity, unless the path already starts with it. Without one,
/// a top-level `__init__.py` keeps the name `__init__`.
pub fn module_identity(relative: &Path, package_root: Option<&str>) -> String {
    let mut parts: Vec<String> = relative
        .iter()
        .filter_map(|s| s.to_str())
        .filter(|s| *s != ".")
        .map(|s| s.to_string())
        .collect();

    if let Some(last) = parts.last_mut() {
        for ext in SOURCE_EXTENSIONS {
            if let Some(stem) = last.strip_suffix(ext) {
                *last = stem.to_string();
                break;
            }
        }
    }

    if parts.last().map(|s| s.as_str()) == Some("__init__") {
        parts.pop();
    }

    let local = parts.join(".");
    match package_root {
        Some(root) if !within_root(&local, root) => {
            if local.is_empty() {
                root.to_string()
            } else {
                format!("{}.{}", root, local)
            }
        }
        _ if local.is_empty() => ROOT_INIT_MODULE.to_string(),
        _ => local,
    }
}

/// Check whether a path names a package initializer
pub fn is_package_init(relative: &Path) -> bool {
    relative
        .file_stem()
        .map(|s| s == "__init__")
        .unwrap_or(false)
}

/// Check whether a dotted name is the root or lives under it
pub fn within_root(name: &str, root: &str) -> bool {
    name == root || (name.starts_with(root) && name[root.len()..].starts_with('.'))
}

/// Resolve `from <dots><module> import ...` against the importing module.
///
/// Returns `None` when the dots climb above the analysis root. An empty string
/// means "the root itself" (e.g. `from . import x` in a top-level file).
pub fn resolve_relative(
    importer: &str,
    importer_is_package: bool,
    level: usize,
    module: &str,
) -> Option<String> {
    let importer = if importer_is_package && importer == ROOT_INIT_MODULE {
        ""
    } else {
        importer
    };
    let mut parts: Vec<&str> = if importer.is_empty() {
        Vec::new()
    } else {
        importer.split('.').collect()
    };

    let drop = if importer_is_package {
        level.saturating_sub(1)
    } else {
        level
    };
    if drop > parts.len() {
        return None;
    }
    parts.truncate(parts.len() - drop);

    if !module.is_empty() {
        parts.extend(module.split('.'));
    }
    Some(parts.join("."))
}

/// Classify an absolute import target
pub fn classify(target: &str, package_root: Option<&str>) -> ImportClass {
    match package_root {
        Some(root) if within_root(target, root) => ImportClass::Internal,
        _ => ImportClass::External,
    }
}

/// Resolve an import target to a known module identity.
///
/// `from pkg import sub` resolves to `pkg.sub` when that module exists;
/// otherwise the longest dotted prefix of the target that is a module wins.
pub fn resolve_target(
    target: &str,
    name: Option<&str>,
    modules: &BTreeSet<String>,
) -> Option<String> {
    if let Some(name) = name.filter(|n| *n != "*") {
        let full = if target.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", target, name)
        };
        if modules.contains(&full) {
            return Some(full);
        }
    }

    let mut candidate = target;
    while !candidate.is_empty() {
        if modules.contains(candidate) {
            return Some(candidate.to_string());
        }
        candidate = match candidate.rfind('.') {
            Some(idx) => &candidate[..idx],
            None => "",
        };
    }
    None
}
