use crate::ownership;
use crate::provider::{Entry, Provider};
use crate::ui;
use anyhow::{Context, Result};

pub fn run(json: bool) -> Result<()> {
    let provider = Provider::new();

    if json {
        let rendered =
            serde_json::to_string_pretty(&provider).context("Failed to render provider schema")?;
        println!("{rendered}");
        return Ok(());
    }

    ui::header(&format!("{} {}", provider.name, provider.version));
    let model = if ownership::detect().supported() {
        "posix"
    } else {
        "not available on this platform"
    };
    ui::kv("ownership", model);
    print_entries("Resources", &provider.resources);
    print_entries("Data Sources", &provider.data_sources);
    print_entries("Functions", &provider.functions);
    Ok(())
}

fn print_entries(title: &str, entries: &[Entry]) {
    ui::section(title);
    for entry in entries {
        ui::kv(entry.name, entry.description);
    }
}
