//! `<skills_dir>/<name>/SKILL.md` files for agents that load skills from disk.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::core::draft::{slugify, unwrap_code_fence};
use crate::core::record::SkillRecord;
use crate::error::Result;

static INLINE_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)([\w][\w-]*):\s*\[(.+)\]\s*$").unwrap());

static TOP_LEVEL_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w][\w-]*):").unwrap());

static VALIDATION_PASSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s+)validation_passed:.*$").unwrap());

#[derive(Debug, Clone)]
pub struct SkillDirWriter {
    root: PathBuf,
    drop_version: bool,
}

impl SkillDirWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            drop_version: false,
        }
    }

    #[must_use]
    pub const fn drop_version(mut self, drop: bool) -> Self {
        self.drop_version = drop;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the record's content, sanitized, and return the file path.
    pub fn write(&self, record: &SkillRecord) -> Result<PathBuf> {
        let dir = self.root.join(slugify(&record.name));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("SKILL.md");
        let content = sanitize_frontmatter(
            &unwrap_code_fence(&record.content),
            self.drop_version,
            Some(record.validation_passed),
        );
        std::fs::write(&path, content)?;
        info!(skill = %record.name, path = %path.display(), "wrote SKILL.md");
        Ok(path)
    }
}

/// Rewrite the frontmatter block only: inline `[a, b]` lists become block
/// lists, a top-level `version` is dropped when asked, and
/// `metadata.validation_passed` is set to the given verdict.
#[must_use]
pub fn sanitize_frontmatter(content: &str, drop_version: bool, passed: Option<bool>) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.first().is_none_or(|line| line.trim() != "---") {
        return content.to_string();
    }
    let Some(end) = lines.iter().skip(1).position(|line| line.trim() == "---").map(|i| i + 1) else {
        return content.to_string();
    };

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if idx == 0 || idx >= end {
            out.push((*line).to_string());
            continue;
        }
        if !line.starts_with(' ') {
            if let Some(caps) = TOP_LEVEL_KEY_RE.captures(line) {
                if drop_version && &caps[1] == "version" {
                    continue;
                }
            }
        }
        if let (Some(passed), Some(caps)) = (passed, VALIDATION_PASSED_RE.captures(line)) {
            out.push(format!("{}validation_passed: {passed}", &caps[1]));
            continue;
        }
        if let Some(caps) = INLINE_LIST_RE.captures(line) {
            let indent = &caps[1];
            out.push(format!("{indent}{}:", &caps[2]));
            for item in caps[3].split(',').map(str::trim).filter(|i| !i.is_empty()) {
                out.push(format!("{indent}  - {item}"));
            }
            continue;
        }
        out.push((*line).to_string());
    }

    let mut joined = out.join("\n");
    if content.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::draft::Draft;
    use crate::test_utils::fixtures::sample_skill_md;
    use tempfile::tempdir;

    #[test]
    fn inline_lists_become_block_lists() {
        let md = "---\nname: a\ntags: [docker, containers]\n---\nbody: [not, touched]\n";
        let out = sanitize_frontmatter(md, false, None);
        assert_eq!(
            out,
            "---\nname: a\ntags:\n  - docker\n  - containers\n---\nbody: [not, touched]\n"
        );
    }

    #[test]
    fn version_dropped_only_when_asked() {
        let md = "---\nname: a\nversion: 1.0.0\nmetadata:\n  version: 2\n---\n";
        assert!(sanitize_frontmatter(md, false, None).contains("version: 1.0.0"));
        let out = sanitize_frontmatter(md, true, None);
        assert!(!out.contains("version: 1.0.0"));
        assert!(out.contains("  version: 2"));
    }

    #[test]
    fn validation_verdict_is_written() {
        let md = sample_skill_md("demo", "demo", &["true"]);
        let out = sanitize_frontmatter(&md, false, Some(true));
        assert!(out.contains("  validation_passed: true"));
    }

    #[test]
    fn content_without_frontmatter_is_untouched() {
        assert_eq!(sanitize_frontmatter("# Title\n", true, Some(true)), "# Title\n");
    }

    #[test]
    fn writer_creates_named_directory() {
        let dir = tempdir().unwrap();
        let draft = Draft::from_markdown("docker", &sample_skill_md("docker-basics", "docker", &["true"]));
        let record = SkillRecord::from_draft(&draft, true, 2, 1);
        let path = SkillDirWriter::new(dir.path()).write(&record).unwrap();
        assert_eq!(path, dir.path().join("docker-basics").join("SKILL.md"));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("---\nname: docker-basics"));
    }
}
