//! Draft SKILL.md documents.
//!
//! A draft is the generator's output for one attempt: YAML frontmatter
//! followed by the fixed section layout. Only the `Procedure` section is
//! executable; every other section is checked for presence only.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{ForgeError, Result};

/// Frontmatter keys every draft must carry (dotted paths address nested maps).
pub const REQUIRED_KEYS: [&str; 7] = [
    "name",
    "description",
    "version",
    "metadata.domain",
    "metadata.category",
    "metadata.validation_passed",
    "metadata.sources_used",
];

/// Section layout, in document order.
pub const SECTIONS: [&str; 6] = [
    "When to Use",
    "Prerequisites",
    "Procedure",
    "Verification",
    "Pitfalls",
    "Sources",
];

/// Sections whose absence makes a draft structurally invalid.
const MANDATORY_SECTIONS: [&str; 2] = ["Procedure", "Verification"];

/// Fence languages treated as shell commands.
const EXECUTABLE_LANGS: [&str; 7] = ["", "bash", "sh", "shell", "zsh", "console", "terminal"];

pub const DEFAULT_CATEGORY: &str = "uncategorized";
pub const DEFAULT_VERSION: &str = "0.1.0";

static STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:#{3,6}\s+)?(?:[Ss]tep\s+)?(\d+)[.):](?:\s+(.*))?$").unwrap()
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap());

/// A generated, not-yet-validated procedure document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub name: String,
    pub topic: String,
    pub category: String,
    pub version: String,
    pub description: String,
    /// Full SKILL.md text, frontmatter included.
    pub content: String,
}

impl Draft {
    /// Build a draft from generator output.
    ///
    /// Never fails: fields missing from the frontmatter fall back to
    /// topic-derived defaults, and structural problems are reported later by
    /// [`check_structure`] so they can count as a validation failure.
    #[must_use]
    pub fn from_markdown(topic: &str, raw: &str) -> Self {
        let content = unwrap_code_fence(raw);
        let front = split_frontmatter(&content)
            .and_then(|(yaml, _)| serde_yaml::from_str::<Mapping>(yaml).ok())
            .unwrap_or_default();

        let name = lookup_string(&front, "name")
            .filter(|name| !name.trim().is_empty())
            .map_or_else(|| slugify(topic), |name| name.trim().to_string());
        let topic_value = lookup_string(&front, "metadata.domain")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| topic.to_string());
        let category = lookup_string(&front, "metadata.category")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let version =
            lookup_string(&front, "version").unwrap_or_else(|| DEFAULT_VERSION.to_string());
        let description = lookup_string(&front, "description").unwrap_or_default();

        Self {
            name,
            topic: topic_value,
            category,
            version,
            description,
            content,
        }
    }

    /// Structural check of frontmatter and section layout.
    #[must_use]
    pub fn check(&self) -> StructureReport {
        check_structure(&self.content)
    }

    /// Parse the `Procedure` section into ordered steps.
    pub fn procedure(&self) -> Result<Procedure> {
        parse_procedure(&self.content)
    }
}

/// Outcome of structural validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl StructureReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One numbered step of the `Procedure` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStep {
    /// Number as written in the document.
    pub number: usize,
    pub title: String,
    /// Shell command from the step's fenced block, if it has one.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub steps: Vec<ProcedureStep>,
}

impl Procedure {
    /// Ordered command sequence, skipping steps without a command.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|step| step.command.clone())
            .collect()
    }

    /// Step number of the `index`-th command.
    #[must_use]
    pub fn step_for_command(&self, index: usize) -> Option<usize> {
        self.steps
            .iter()
            .filter(|step| step.command.is_some())
            .nth(index)
            .map(|step| step.number)
    }
}

/// Check frontmatter keys and the section layout of a SKILL.md document.
#[must_use]
pub fn check_structure(content: &str) -> StructureReport {
    let mut report = StructureReport::default();

    match split_frontmatter(content) {
        Some((yaml, _)) => check_frontmatter(yaml, &mut report),
        None => report
            .errors
            .push("missing YAML frontmatter block delimited by '---'".to_string()),
    }

    let titles = section_titles(content);
    for section in SECTIONS {
        if titles.iter().any(|title| title.eq_ignore_ascii_case(section)) {
            continue;
        }
        let message = format!("missing `## {section}` section");
        if MANDATORY_SECTIONS.contains(&section) {
            report.errors.push(message);
        } else {
            report.warnings.push(message);
        }
    }

    if titles.iter().any(|title| title.eq_ignore_ascii_case("Procedure")) {
        match parse_procedure_steps(content) {
            Ok(procedure) if procedure.steps.is_empty() => report
                .warnings
                .push("`## Procedure` has no numbered steps".to_string()),
            Ok(_) => {}
            Err(message) => report.errors.push(message),
        }
    }

    report
}

fn check_frontmatter(yaml: &str, report: &mut StructureReport) {
    let map = match serde_yaml::from_str::<YamlValue>(yaml) {
        Ok(YamlValue::Mapping(map)) => map,
        Ok(_) => {
            report
                .errors
                .push("frontmatter is not a YAML mapping".to_string());
            return;
        }
        Err(err) => {
            report
                .errors
                .push(format!("frontmatter is not valid YAML: {err}"));
            return;
        }
    };

    for key in REQUIRED_KEYS {
        match lookup(&map, key) {
            None | Some(YamlValue::Null) => report
                .errors
                .push(format!("missing required frontmatter key `{key}`")),
            Some(_) => {}
        }
    }

    if let Some(value) = lookup(&map, "name") {
        match value.as_str() {
            Some(name) if NAME_RE.is_match(name) => {}
            Some(name) => report.errors.push(format!(
                "`name` must be lowercase letters, digits and hyphens, got `{name}`"
            )),
            None => report.errors.push("`name` must be a string".to_string()),
        }
    }
    if let Some(value) = lookup(&map, "description") {
        if value.as_str().is_none_or(|text| text.trim().is_empty()) {
            report
                .errors
                .push("`description` must be a non-empty string".to_string());
        }
    }
    if let Some(value) = lookup(&map, "metadata.validation_passed") {
        if !value.is_null() && value.as_bool().is_none() {
            report
                .errors
                .push("`metadata.validation_passed` must be a boolean".to_string());
        }
    }
    if let Some(value) = lookup(&map, "metadata.sources_used") {
        if !value.is_null() && value.as_u64().is_none() {
            report
                .errors
                .push("`metadata.sources_used` must be a non-negative integer".to_string());
        }
    }
}

/// Parse the `Procedure` section into ordered steps.
pub fn parse_procedure(content: &str) -> Result<Procedure> {
    parse_procedure_steps(content).map_err(ForgeError::InvalidDraft)
}

struct OpenFence {
    marker: String,
    indent: usize,
    executable: bool,
    console: bool,
    body: Vec<String>,
}

struct StepBuilder {
    number: usize,
    title: String,
    commands: Vec<String>,
}

fn parse_procedure_steps(content: &str) -> std::result::Result<Procedure, String> {
    let lines = section_lines(content, "Procedure")
        .ok_or_else(|| "missing `## Procedure` section".to_string())?;

    let mut builders: Vec<StepBuilder> = Vec::new();
    let mut fence: Option<OpenFence> = None;

    for line in lines {
        let trimmed = line.trim_start();

        if let Some(mut open) = fence.take() {
            if trimmed.trim_end() == open.marker {
                if open.executable {
                    if let (Some(step), Some(command)) = (builders.last_mut(), fence_command(&open))
                    {
                        step.commands.push(command);
                    }
                }
            } else {
                open.body.push(dedent(line, open.indent));
                fence = Some(open);
            }
            continue;
        }

        if let Some(marker) = fence_marker(trimmed) {
            let info = trimmed[marker.len()..].trim();
            let lang = info
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            fence = Some(OpenFence {
                marker,
                indent: line.len() - trimmed.len(),
                executable: EXECUTABLE_LANGS.contains(&lang.as_str()),
                console: lang == "console",
                body: Vec::new(),
            });
            continue;
        }

        if let Some(caps) = STEP_RE.captures(line) {
            let number = caps[1].parse::<usize>().map_err(|err| err.to_string())?;
            let title = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            builders.push(StepBuilder {
                number,
                title,
                commands: Vec::new(),
            });
        }
    }

    if fence.is_some() {
        return Err("unterminated code fence in `## Procedure`".to_string());
    }

    let mut steps = Vec::with_capacity(builders.len());
    for builder in builders {
        if builder.commands.len() > 1 {
            return Err(format!(
                "procedure step {} has {} executable code blocks; at most one is allowed",
                builder.number,
                builder.commands.len()
            ));
        }
        steps.push(ProcedureStep {
            number: builder.number,
            title: builder.title,
            command: builder.commands.into_iter().next(),
        });
    }

    Ok(Procedure { steps })
}

fn fence_marker(trimmed: &str) -> Option<String> {
    for ch in ['`', '~'] {
        let run = trimmed.chars().take_while(|c| *c == ch).count();
        if run >= 3 {
            return Some(std::iter::repeat_n(ch, run).collect());
        }
    }
    None
}

fn fence_command(fence: &OpenFence) -> Option<String> {
    let lines: Vec<&str> = fence
        .body
        .iter()
        .map(|line| {
            if fence.console {
                line.strip_prefix("$ ").unwrap_or(line)
            } else {
                line.as_str()
            }
        })
        .collect();
    let command = lines.join("\n").trim().to_string();
    (!command.is_empty()).then_some(command)
}

fn dedent(line: &str, indent: usize) -> String {
    let leading = line.len() - line.trim_start_matches(' ').len();
    line[leading.min(indent)..].to_string()
}

/// Titles of all `## ` headings outside code fences.
fn section_titles(content: &str) -> Vec<String> {
    let mut titles = Vec::new();
    let mut in_fence: Option<String> = None;
    for line in content.lines() {
        let trimmed = line.trim_start();
        if let Some(marker) = &in_fence {
            if trimmed.trim_end() == marker {
                in_fence = None;
            }
            continue;
        }
        if let Some(marker) = fence_marker(trimmed) {
            in_fence = Some(marker);
            continue;
        }
        if let Some(title) = line.strip_prefix("## ") {
            titles.push(title.trim().to_string());
        }
    }
    titles
}

/// Lines belonging to the `## {title}` section, up to the next level 1-2 heading.
fn section_lines<'a>(content: &'a str, title: &str) -> Option<Vec<&'a str>> {
    let mut lines = Vec::new();
    let mut inside = false;
    let mut in_fence: Option<String> = None;

    for line in content.lines() {
        let trimmed = line.trim_start();
        if in_fence.is_none() {
            let heading = line
                .strip_prefix("## ")
                .or_else(|| line.strip_prefix("# "));
            if let Some(heading) = heading {
                if inside {
                    return Some(lines);
                }
                inside = line.starts_with("## ") && heading.trim().eq_ignore_ascii_case(title);
                continue;
            }
        }
        if let Some(marker) = &in_fence {
            if trimmed.trim_end() == marker {
                in_fence = None;
            }
        } else if let Some(marker) = fence_marker(trimmed) {
            in_fence = Some(marker);
        }
        if inside {
            lines.push(line);
        }
    }

    inside.then_some(lines)
}

/// Split `---` delimited frontmatter from the body.
#[must_use]
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Strip an outer ```markdown fence some models wrap the whole document in.
#[must_use]
pub fn unwrap_code_fence(text: &str) -> String {
    let trimmed = text.trim_start();
    let Some(first) = trimmed.lines().next() else {
        return text.to_string();
    };
    if !first.trim().starts_with("```") {
        return trimmed.to_string();
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    let Some(close) = lines
        .iter()
        .rposition(|line| line.trim() == "```")
        .filter(|idx| *idx > 0)
    else {
        return trimmed.to_string();
    };

    let mut out = lines[1..close].join("\n");
    let rest = lines[close + 1..].join("\n");
    if !rest.trim().is_empty() {
        out.push('\n');
        out.push_str(&rest);
    }
    out.trim_start_matches('\n').to_string()
}

fn lookup<'a>(map: &'a Mapping, path: &str) -> Option<&'a YamlValue> {
    let mut parts = path.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn lookup_string(map: &Mapping, path: &str) -> Option<String> {
    match lookup(map, path)? {
        YamlValue::String(value) => Some(value.clone()),
        YamlValue::Number(value) => Some(value.to_string()),
        YamlValue::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Lowercase, hyphen-separated form of a topic.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "skill".to_string()
    } else {
        slug
    }
}
