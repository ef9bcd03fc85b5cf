use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted hint on stderr
pub fn hint(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Host name with its provider, for listings
pub fn host_line(name: &str, provider: &str, latest: bool) -> String {
    let marker = if latest { "*" } else { " " };
    if provider.is_empty() {
        format!("{marker} {name}")
    } else {
        format!("{marker} {name} ({provider})")
    }
}

// ============================================================================
// Tests
// ============================================================================
