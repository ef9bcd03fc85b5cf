//! List host configurations.

use crate::Context;
use crate::commands::host;
use crate::ui;
use anyhow::Result;

/// Print every host name, marking the last used one.
pub fn run(ctx: &Context) -> Result<()> {
    let store = host::store()?;
    let names = store.list()?;

    if ctx.quiet {
        for name in &names {
            println!("{name}");
        }
        return Ok(());
    }

    if names.is_empty() {
        ui::info("No host configuration, create one with \"init\"");
        return Ok(());
    }

    let latest = store.latest()?;
    ui::header("Hosts");
    for name in &names {
        let provider = match store.load(name) {
            Ok(config) => config.provider().to_string(),
            Err(e) => {
                log::debug!("Unable to load host {name}: {e}");
                String::new()
            }
        };
        println!("{}", ui::host_line(name, &provider, latest.as_deref() == Some(name.as_str())));
    }
    Ok(())
}
