//! Skill definitions used to seed the system prompt.

use std::fmt::Write;

use serde::Deserialize;

/// A file or other resource bundled with a skill.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkillResource {
    pub kind: String,
    pub path: String,
}

/// A loaded skill: instructions plus the resources they refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub resources: Vec<SkillResource>,
}

impl Skill {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_resource(mut self, kind: impl Into<String>, path: impl Into<String>) -> Self {
        self.resources.push(SkillResource {
            kind: kind.into(),
            path: path.into(),
        });
        self
    }

    /// Render the system prompt text for this skill.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("# {}\n\n{}\n", self.name, self.description);

        if !self.instructions.is_empty() {
            prompt.push_str("\n## Instructions\n\n");
            prompt.push_str(&self.instructions);
            prompt.push('\n');
        }

        if !self.resources.is_empty() {
            prompt.push_str("\n## Available Resources\n\n");
            for resource in &self.resources {
                // Writing to a String cannot fail.
                let _ = writeln!(prompt, "- {}: {}", resource.kind, resource.path);
            }
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_with_all_sections() {
        let skill = Skill::new("pdf", "Work with PDF files.")
            .with_instructions("Use the scripts.")
            .with_resource("script", "scripts/extract.py")
            .with_resource("reference", "docs/forms.md");

        assert_eq!(
            skill.system_prompt(),
            "# pdf\n\nWork with PDF files.\n\n## Instructions\n\nUse the scripts.\n\n\
             ## Available Resources\n\n- script: scripts/extract.py\n- reference: docs/forms.md\n"
        );
    }

    #[test]
    fn empty_sections_are_omitted() {
        let prompt = Skill::new("bare", "Nothing else.").system_prompt();
        assert_eq!(prompt, "# bare\n\nNothing else.\n");
    }
}
