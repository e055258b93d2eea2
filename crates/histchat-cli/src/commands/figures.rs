use crate::context::CliContext;
use anyhow::{Context, Result};
use histchat_core::figure::{Figure, FigureCatalog};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct ImportFile {
    #[serde(default, rename = "figure")]
    figures: Vec<Figure>,
}

pub async fn list(ctx: &CliContext) -> Result<()> {
    let figures = ctx.catalog.list_all().await?;
    if figures.is_empty() {
        println!("No figures yet. Add some with `histchat figures import <file>`.");
        return Ok(());
    }

    for figure in figures {
        let era = figure.era.as_deref().unwrap_or("-");
        println!("{:<20} {:<28} {}", figure.slug, figure.name, era);
        if let Some(description) = &figure.description {
            println!("  {}", description);
        }
        println!("  documents: {}", figure.documents.len());
    }
    Ok(())
}

pub fn import(ctx: &CliContext, path: &Path) -> Result<()> {
    let figures = read_import_file(path)?;
    let count = figures.len();
    for figure in figures {
        let slug = figure.slug.clone();
        ctx.catalog
            .upsert(figure)
            .with_context(|| format!("Failed to import figure '{}'", slug))?;
        println!("✅ {}", slug);
    }
    println!("Imported {} figure(s) from {}", count, path.display());
    Ok(())
}

pub fn remove(ctx: &CliContext, slug: &str) -> Result<()> {
    ctx.catalog.remove(slug)?;
    println!("🗑  Removed {}", slug);
    Ok(())
}

fn read_import_file(path: &Path) -> Result<Vec<Figure>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: ImportFile =
        toml::from_str(&content).with_context(|| format!("Invalid figure file {}", path.display()))?;
    Ok(file.figures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_import_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[figure]]
slug = "cleopatra"
name = "Cleopatra VII"
persona_prompt = "You are Cleopatra."

[[figure.document]]
source_name = "Plutarch"
content = "Antony and Cleopatra met at Tarsus."
"#
        )
        .unwrap();

        let figures = read_import_file(file.path()).unwrap();
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].slug, "cleopatra");
        assert_eq!(figures[0].documents.len(), 1);
    }

    #[test]
    fn test_read_import_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[figure]]\nname = ").unwrap();
        assert!(read_import_file(file.path()).is_err());
    }
}
