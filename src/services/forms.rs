//! Compilation of declarative UI form files into generated source modules
//!
//! Each `<name>.ui` file in the input directory is handed to an external
//! compiler; the produced `<prefix><name>.<ext>` file is then patched so that
//! its top-level imports resolve relative to the parent package.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::config::FormSettings;

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

// Top-level `from <module> import ` with a plain, undotted module name
static PLAIN_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^from ([A-Za-z_][A-Za-z0-9_]*) import ").unwrap());

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Form directory {0} does not exist")]
    MissingInputDir(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compiling {file} failed: {reason}")]
    CompilerFailed { file: PathBuf, reason: String },
}

impl FormError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        FormError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledForm {
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCompiler {
    pub program: String,
    /// Arguments; `{input}` and `{output}` are replaced per form
    pub args: Vec<String>,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub source_extension: String,
    pub prefix: String,
    pub extension: String,
}

impl From<&FormSettings> for FormCompiler {
    fn from(settings: &FormSettings) -> Self {
        Self {
            program: settings.compiler.clone(),
            args: settings.args.clone(),
            input_dir: settings.input_dir.clone(),
            output_dir: settings.output_dir.clone(),
            source_extension: settings.source_extension.clone(),
            prefix: settings.prefix.clone(),
            extension: settings.extension.clone(),
        }
    }
}

impl FormCompiler {
    /// Form files in the input directory, sorted by file name
    pub fn discover_forms(&self) -> Result<Vec<PathBuf>, FormError> {
        if !self.input_dir.is_dir() {
            return Err(FormError::MissingInputDir(self.input_dir.clone()));
        }

        let entries =
            std::fs::read_dir(&self.input_dir).map_err(|e| FormError::io(&self.input_dir, e))?;

        let mut forms = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| FormError::io(&self.input_dir, e))?.path();
            let matches_extension = path
                .extension()
                .is_some_and(|ext| ext == self.source_extension.as_str());

            if path.is_file() && matches_extension {
                forms.push(path);
            }
        }

        forms.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(forms)
    }

    /// `<output_dir>/<prefix><stem>.<extension>`
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.output_dir
            .join(format!("{}{}.{}", self.prefix, stem, self.extension))
    }

    fn command_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let output = output.display().to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    /// Compile and patch a single form
    pub async fn compile(&self, source: &Path) -> Result<CompiledForm, FormError> {
        let output = self.output_path_for(source);
        let args = self.command_args(source, &output);

        tracing::debug!("{} {}", self.program, args.join(" "));

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|e| FormError::CompilerFailed {
                file: source.to_path_buf(),
                reason: format!("could not run '{}': {}", self.program, e),
            })?;

        if !status.success() {
            return Err(FormError::CompilerFailed {
                file: source.to_path_buf(),
                reason: status.to_string(),
            });
        }

        let generated = std::fs::read_to_string(&output).map_err(|e| FormError::io(&output, e))?;
        let patched = patch_imports(&generated);
        if patched != generated {
            std::fs::write(&output, patched).map_err(|e| FormError::io(&output, e))?;
        }

        Ok(CompiledForm {
            source: source.to_path_buf(),
            output,
        })
    }

    /// Compile every form in order, stopping at the first failure
    pub async fn compile_all(&self) -> Result<Vec<CompiledForm>, FormError> {
        let forms = self.discover_forms()?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| FormError::io(&self.output_dir, e))?;

        let mut compiled = Vec::with_capacity(forms.len());
        for form in forms {
            let result = self.compile(&form).await?;
            tracing::info!("Compiled {} -> {}", result.source.display(), result.output.display());
            compiled.push(result);
        }

        Ok(compiled)
    }
}

/// Make top-level imports of plain modules relative to the parent package
///
/// `from foo import Bar` becomes `from ..foo import Bar`. Every other line,
/// including its line ending, is kept as is.
pub fn patch_imports(text: &str) -> String {
    let mut patched = String::with_capacity(text.len() + 16);

    for line in text.split_inclusive('\n') {
        patched.push_str(&PLAIN_IMPORT.replace(line, "from ..${1} import "));
    }

    patched
}
