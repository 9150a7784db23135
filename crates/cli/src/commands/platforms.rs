use std::path::Path;

use satchel_core::config::SatchelConfig;
use satchel_core::platforms::registry::{AdapterRegistry, CredentialShape};

/// Run the `platforms` command: list registered platforms and the credentials each needs.
pub fn run(config_path: &str, json: bool) -> anyhow::Result<()> {
    let config = SatchelConfig::load(Path::new(config_path))?;
    config.validate()?;

    let shapes = AdapterRegistry::from_config(&config)?.describe();
    if json {
        println!("{}", serde_json::to_string_pretty(&shapes)?);
        return Ok(());
    }

    println!("{}", render(&shapes));
    if !config.browser.enabled {
        println!("OWLv2 needs [browser] enabled = true.");
    }
    Ok(())
}

fn render(shapes: &[CredentialShape]) -> String {
    let mut out = format!("{:<12} {:<16} {}\n", "PLATFORM", "KIND", "CREDENTIALS");
    for shape in shapes {
        out.push_str(&format!(
            "{:<12} {:<16} {}\n",
            shape.platform.as_str(),
            shape.variant.as_str(),
            shape.required.join(", ")
        ));
    }
    out
}
