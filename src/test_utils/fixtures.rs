use std::fmt::Write as _;
use std::path::PathBuf;

use tempfile::TempDir;

/// Well-formed SKILL.md whose procedure runs `commands`, one per step.
#[must_use]
pub fn sample_skill_md(name: &str, topic: &str, commands: &[&str]) -> String {
    let mut md = format!(
        "---\nname: {name}\ndescription: Practical {topic} workflow checked in a sandbox\nversion: 1.0.0\nmetadata:\n  domain: {topic}\n  category: devops\n  validation_passed: false\n  sources_used: 3\n---\n\n# {topic}\n\n## When to Use\nWhen you need {topic}.\n\n## Prerequisites\nA POSIX shell.\n\n## Procedure\n"
    );
    if commands.is_empty() {
        md.push_str("1. Read the overview.\n");
    }
    for (idx, command) in commands.iter().enumerate() {
        let n = idx + 1;
        let _ = write!(md, "{n}. Step {n}\n   ```bash\n   {command}\n   ```\n");
    }
    md.push_str(
        "\n## Verification\nEvery command exits 0.\n\n## Pitfalls\nNone known.\n\n## Sources\n- https://example.com/docs\n",
    );
    md
}

/// Test fixture providing isolated filesystem environment.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl UnitTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();

        println!("[FIXTURE] Created temp directory: {:?}", data_path);

        Self { temp_dir, data_path }
    }

    /// Create a test file with content.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        println!(
            "[FIXTURE] Created file: {:?} ({} bytes)",
            full_path,
            content.len()
        );
        full_path
    }

    /// Write a sample SKILL.md under `skills/<name>/`.
    pub fn create_skill(&self, name: &str, commands: &[&str]) -> PathBuf {
        self.create_file(
            &format!("skills/{name}/SKILL.md"),
            &sample_skill_md(name, name, commands),
        )
    }

    /// Path for a scratch database inside the fixture.
    pub fn db_path(&self) -> PathBuf {
        self.data_path.join("forge.db")
    }
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UnitTestFixture {
    fn drop(&mut self) {
        println!("[FIXTURE] Cleaning up temp directory: {:?}", self.data_path);
    }
}
