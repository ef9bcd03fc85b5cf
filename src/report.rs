//! Error reporting for the command line.

use crate::ui;

/// Headline and optional advice for a command error.
pub fn describe(err: &anyhow::Error) -> (String, Option<&'static str>) {
    for cause in err.chain() {
        let tool_error = match cause.downcast_ref::<hostkit::Error>() {
            Some(hostkit::Error::Toolchain(error)) => Some(error),
            Some(error) => return (format!("{}: {err:#}", error.category().description()), None),
            None => cause.downcast_ref::<toolchain::Error>(),
        };
        if let Some(error) = tool_error {
            let category = error.category();
            return (format!("{category}: {err:#}"), Some(category.advice()));
        }
    }
    (format!("{err:#}"), None)
}

/// Print a command error to stderr.
pub fn print(err: &anyhow::Error) {
    let (message, advice) = describe(err);
    ui::error(&message);
    if let Some(advice) = advice {
        ui::hint(advice);
    }
}
