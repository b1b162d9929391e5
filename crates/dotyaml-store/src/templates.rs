//! Initial file contents for `init`

use crate::error::{StoreError, StoreResult};
use std::borrow::Cow;
use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Project planning layout
pub const PLANNING: &str = "\
# dotyaml configuration
# Created by: dotyaml init --template planning

helper:
  script: dotyaml
  llm: gemini
  llm_cmd: \"-p\"
  max_lines: 2000

project:
  type: \"\"
  framework: \"\"
  package_manager: \"\"
  source_directory: src/

testing:
  runner: \"\"
  directory: \"\"
  cmd: \"\"
  coverage_cmd: \"\"

commands:
  lint: \"\"
  types: \"\"
  build: \"\"

tools:
  html2text: html2text
  clarification_script: \"\"
";

/// Single empty section
pub const MINIMAL: &str = "\
# dotyaml configuration

config: {}
";

/// Source of the initial file contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Template {
    /// Built-in planning layout
    #[default]
    Planning,
    /// Built-in single section
    Minimal,
    /// Contents of a user-supplied file
    File(PathBuf),
}

impl Template {
    /// Load the template text
    ///
    /// # Errors
    /// Returns [`StoreError::Template`] if a template file cannot be read.
    pub fn contents(&self) -> StoreResult<Cow<'static, str>> {
        match self {
            Self::Planning => Ok(Cow::Borrowed(PLANNING)),
            Self::Minimal => Ok(Cow::Borrowed(MINIMAL)),
            Self::File(path) => fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| StoreError::Template {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

impl FromStr for Template {
    type Err = Infallible;

    /// `planning` / `minimal` (or empty for the default); anything else is a
    /// file path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "planning" => Self::Planning,
            "minimal" => Self::Minimal,
            path => Self::File(PathBuf::from(path)),
        })
    }
}
