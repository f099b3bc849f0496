use anyhow::Result;
use std::path::PathBuf;

use memmer::config::Settings;
use memmer::services::FormCompiler;

pub async fn compile_forms(
    settings: &Settings,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut compiler = FormCompiler::from(&settings.forms);
    if let Some(input) = input {
        compiler.input_dir = input;
    }
    if let Some(output) = output {
        compiler.output_dir = output;
    }

    let compiled = compiler.compile_all().await?;

    println!(
        "Compiled {} forms into '{}'",
        compiled.len(),
        compiler.output_dir.display()
    );

    Ok(())
}
