use crate::error::XfsError;

/// Split and validate a user-supplied path into path components relative to
/// the image root (spec.md §6): no leading `/`, no embedded `..`, no empty
/// components. `.` components are skipped. An empty string resolves to the
/// root directory (zero components).
pub fn split_path(path: &str) -> Result<Vec<&str>, XfsError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    if path.starts_with('/') {
        return Err(XfsError::Invalid {
            path: path.to_string(),
            reason: "absolute paths are not accepted",
        });
    }

    let mut components = Vec::new();
    for part in path.split('/') {
        if part.is_empty() {
            return Err(XfsError::Invalid {
                path: path.to_string(),
                reason: "path contains an empty component",
            });
        }
        if part == ".." {
            return Err(XfsError::Invalid {
                path: path.to_string(),
                reason: "parent-directory references are not accepted",
            });
        }
        if part == "." {
            continue;
        }
        components.push(part);
    }

    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path_has_no_components() {
        assert_eq!(split_path("").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn rejects_leading_slash() {
        let err = split_path("/etc").unwrap_err();
        assert!(matches!(err, XfsError::Invalid { .. }));
    }

    #[test]
    fn rejects_dotdot_component() {
        let err = split_path("../etc").unwrap_err();
        assert!(matches!(err, XfsError::Invalid { .. }));
    }

    #[test]
    fn rejects_empty_component() {
        let err = split_path("a//b").unwrap_err();
        assert!(matches!(err, XfsError::Invalid { .. }));
    }

    #[test]
    fn skips_dot_components() {
        assert_eq!(split_path("./a/./b").unwrap(), vec!["a", "b"]);
    }
}
