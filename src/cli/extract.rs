// src/cli/extract.rs — Show extracted text for a file

use std::path::Path;

use crate::extract::Extractor;

pub async fn run_extract(extractor: &Extractor, path: &Path) -> anyhow::Result<()> {
    let text = extractor.extract_file(path).await?;
    println!("{text}");
    Ok(())
}
