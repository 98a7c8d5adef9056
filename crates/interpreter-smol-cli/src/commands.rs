pub mod agents;
pub mod chat;

use anyhow::{anyhow, Result};
use bat::PrettyPrinter;

/// Print `content` with syntax highlighting for `language`
pub fn render(content: &str, language: &str) -> Result<()> {
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language(language)
        .print()
        .map_err(|e| anyhow!("Could not render output: {}", e))?;
    Ok(())
}
