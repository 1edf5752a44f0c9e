use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::PublishError;
use crate::document::split_front_matter;

/// `@include-text-block PATH` or `@include-code-block PATH [LANG]` on a line
/// of its own.
static DIRECTIVE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*@include-(text|code)-block\s+(\S+)(?:\s+(\w+))?\s*$").ok()
});

/// Replaces include directives in `body` with the files they name.
///
/// Paths are resolved against `base_dir`. A text block is inserted without
/// its metadata block. A code block is fenced with `~~~` and tagged with the
/// optional language. Lines inside fenced code are left alone.
pub(crate) async fn expand_includes(body: &str, base_dir: &Path) -> Result<String, PublishError> {
    let Some(pattern) = DIRECTIVE.as_ref() else {
        return Ok(body.to_string());
    };
    if !body.contains("@include-") {
        return Ok(body.to_string());
    }

    let mut out = String::with_capacity(body.len());
    let mut fence: Option<&str> = None;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            out.push_str(line);
            continue;
        }
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            fence = Some(&trimmed[..3]);
            out.push_str(line);
            continue;
        }
        match pattern.captures(line.trim_end_matches(['\r', '\n'])) {
            Some(caps) => {
                out.push_str(&include_block(&caps, base_dir).await?);
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    Ok(out)
}

async fn include_block(caps: &Captures<'_>, base_dir: &Path) -> Result<String, PublishError> {
    let kind = caps.get(1).map_or("", |m| m.as_str());
    let target = caps.get(2).map_or("", |m| m.as_str());
    let path = resolve(base_dir, target);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| PublishError::Include {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(path = %path.display(), kind, "Including block");

    if kind == "code" {
        let language = caps.get(3).map_or("", |m| m.as_str());
        let code = String::from_utf8_lossy(&bytes);
        return Ok(format!("~~~{language}\n{}\n~~~", code.trim_end_matches('\n')));
    }
    let text = match split_front_matter(&bytes) {
        Ok((_, body)) => body,
        Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
    };
    Ok(text.trim_end_matches('\n').to_string())
}

fn resolve(base_dir: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        target.to_path_buf()
    } else {
        base_dir.join(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_text_block_drops_included_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bio.md"), "---\ntitle: Bio\n---\nI write *Rust*.\n").unwrap();

        let body = "# About\n\n@include-text-block bio.md\n\nThanks.\n";
        let expanded = expand_includes(body, dir.path()).await.unwrap();

        assert_eq!(expanded, "# About\n\nI write *Rust*.\n\nThanks.\n");
    }

    #[tokio::test]
    async fn test_code_block_is_fenced_with_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/hello.rs"), "fn main() {}\n").unwrap();

        let body = "Example:\n\n  @include-code-block src/hello.rs rust\n";
        let expanded = expand_includes(body, dir.path()).await.unwrap();

        assert_eq!(expanded, "Example:\n\n~~~rust\nfn main() {}\n~~~\n");
    }

    #[tokio::test]
    async fn test_code_block_without_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.sh"), "echo hi").unwrap();

        let expanded = expand_includes("@include-code-block run.sh", dir.path())
            .await
            .unwrap();
        assert_eq!(expanded, "~~~\necho hi\n~~~");
    }

    #[tokio::test]
    async fn test_missing_include_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = expand_includes("@include-text-block nope.md\n", dir.path())
            .await
            .unwrap_err();

        match err {
            PublishError::Include { path, source } => {
                assert_eq!(path, dir.path().join("nope.md"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_directives_in_fenced_code_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let body = "```\n@include-text-block nope.md\n```\nInline @include-text-block nope.md stays.\n";
        let expanded = expand_includes(body, dir.path()).await.unwrap();
        assert_eq!(expanded, body);
    }
}
