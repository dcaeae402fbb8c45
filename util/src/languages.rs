use serde::{Deserialize, Serialize};

/// Kernel languages the grader knows how to drive.
/// Serialized/deserialized in `lowercase` for grading definitions.
/// Common aliases are accepted (e.g., "ir", "python3").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelLanguage {
    #[serde(alias = "ir")]
    R,
    #[serde(alias = "python3", alias = "py")]
    Python,
}

impl KernelLanguage {
    /// Jupyter kernel name handed to the bridge process.
    pub fn kernel_name(self) -> &'static str {
        match self {
            KernelLanguage::R => "ir",
            KernelLanguage::Python => "python3",
        }
    }

    /// Chunk header languages (`{r}`, `{python}`) this kernel executes.
    pub fn chunk_languages(self) -> &'static [&'static str] {
        match self {
            KernelLanguage::R => &["r", "R"],
            KernelLanguage::Python => &["python", "py"],
        }
    }

    /// Code that clears every user-defined name from the workspace.
    pub fn reset_code(self) -> &'static str {
        match self {
            KernelLanguage::R => "rm(list = ls(all.names = TRUE))",
            KernelLanguage::Python => "%reset -f",
        }
    }
}

impl std::str::FromStr for KernelLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "r" | "ir" => Ok(KernelLanguage::R),
            "python" | "python3" | "py" => Ok(KernelLanguage::Python),
            other => Err(format!("Unsupported kernel language: {other}")),
        }
    }
}
