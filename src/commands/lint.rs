//! Application definition linting.

use crate::Context;
use crate::ui;
use anyhow::{Context as _, Result};
use std::path::Path;

/// Validate an application definition file.
pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    let definition = appdef::Definition::load(file)
        .with_context(|| format!("Invalid application definition {}", file.display()))?;

    if !ctx.quiet {
        ui::success(&format!("{} is valid", file.display()));
        let environments = definition.environments();
        if !environments.is_empty() {
            ui::kv(
                "Environments",
                &environments.iter().cloned().collect::<Vec<_>>().join(", "),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CTX: Context = Context { quiet: true };

    #[test]
    fn test_lint_valid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("application.yml");
        fs::write(
            &path,
            "application:\n  name: app\n  version: 1.0.0\npackage:\n  name: image\nfpga:\n  image: agfi-1\naccelize_drm:\n  use_service: false\n",
        )
        .unwrap();
        run(&CTX, &path).unwrap();
    }

    #[test]
    fn test_lint_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("application.yml");
        fs::write(&path, "application:\n  name: app\n").unwrap();
        let err = run(&CTX, &path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid application definition"));
    }
}
