//! Artifact import specifier resolution.
//!
//! Maps a (source file, definition name) pair to the module specifier of
//! the generated artifact. Pure string manipulation: module specifiers
//! always use forward slashes, whatever the host OS uses for real paths,
//! and the resolver never touches the filesystem.

/// Default convention directory, sibling to each source file.
pub const GENERATED_DIR: &str = "__generated__";

/// Compute the import specifier for a definition's artifact.
///
/// Without an artifact directory the convention path
/// `./__generated__/<Name>.graphql` is used, relative to the source
/// file. With one, the specifier walks from the source file's directory
/// to the artifact directory (resolved against the process working
/// directory when given relative, as the host build tool does).
pub fn resolve_artifact_path(
    file: &str,
    definition_name: &str,
    artifact_directory: Option<&str>,
) -> String {
    let import_file = format!("{}.graphql", definition_name);

    let artifact_directory = match artifact_directory {
        Some(dir) => dir,
        None => return format!("./{}/{}", GENERATED_DIR, import_file),
    };

    let file_dir = parent_dir(file);
    let artifact_dir = absolutize(artifact_directory);
    let relative = relative_path(&file_dir, &artifact_dir);

    let reference = if relative.is_empty() || !relative.starts_with('.') {
        "./"
    } else {
        ""
    };

    if relative.is_empty() {
        format!("{}{}", reference, import_file)
    } else {
        format!("{}{}/{}", reference, relative, import_file)
    }
}

/// Directory part of a path, with separators normalized to `/`.
fn parent_dir(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    match normalized.rfind('/') {
        Some(idx) => normalized[..idx].to_string(),
        None => String::new(),
    }
}

/// Resolve a possibly-relative path against the working directory, then
/// collapse `.` and `..` segments textually.
fn absolutize(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let joined = if is_absolute(&normalized) {
        normalized
    } else {
        let cwd = std::env::current_dir()
            .map(|dir| dir.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| String::from("/"));
        format!("{}/{}", cwd.trim_end_matches('/'), normalized)
    };
    components(&joined).join("/")
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.chars().nth(1) == Some(':')
}

/// Path components with `.` dropped and `..` folding the previous
/// component away. The leading root component stays (empty string for a
/// `/`-rooted path, `C:` for a drive-rooted one).
fn components(path: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for (i, segment) in path.split('/').enumerate() {
        match segment {
            "." => {}
            "" if i > 0 => {}
            ".." => {
                if parts.len() > 1 {
                    parts.pop();
                }
            }
            other => parts.push(other.to_string()),
        }
    }
    parts
}

/// Relative path from one absolute directory to another, `/`-joined.
fn relative_path(from: &str, to: &str) -> String {
    let from = components(&from.replace('\\', "/"));
    let to = components(to);

    let mut common = 0;
    while common < from.len() && common < to.len() && from[common] == to[common] {
        common += 1;
    }

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for segment in &to[common..] {
        parts.push(segment.clone());
    }
    parts.join("/")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
