use colored::Colorize;
use declarative::{ChangeAction, Diagnostic, Severity};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
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

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print one planned change as `+ address`, `~ address` or `- address`
pub fn change(action: ChangeAction, address: &str) {
    let line = format!("{} {address}", action.symbol());
    match action {
        ChangeAction::Create => println!("  {}", line.green()),
        ChangeAction::Update => println!("  {}", line.yellow()),
        ChangeAction::Delete => println!("  {}", line.red()),
        ChangeAction::NoOp => println!("  {}", line.dimmed()),
    }
}

/// Print a diagnostic attached to a resource address
pub fn diagnostic(address: &str, diag: &Diagnostic) {
    let text = format_diagnostic(address, diag);
    match diag.severity {
        Severity::Warning => warn(&text),
        Severity::Error => error(&text),
    }
}

fn format_diagnostic(address: &str, diag: &Diagnostic) -> String {
    if diag.detail.is_empty() {
        format!("{address}: {}", diag.summary)
    } else {
        format!("{address}: {}: {}", diag.summary, diag.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Diagnostics;

    #[test]
    fn test_format_diagnostic() {
        let mut diags = Diagnostics::new();
        diags.warn("File Deletion Failed", "permission denied");
        diags.error("Directory Not Found", "");

        let lines: Vec<_> = diags
            .iter()
            .map(|d| format_diagnostic("utilities_extract_zip.app", d))
            .collect();

        assert_eq!(
            lines[0],
            "utilities_extract_zip.app: File Deletion Failed: permission denied"
        );
        assert_eq!(lines[1], "utilities_extract_zip.app: Directory Not Found");
    }
}
