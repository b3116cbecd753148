//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the ubo-trace CLI.

use crate::types::{ConnectionStatus, StageResult, StageStatus, TraceSummary};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the ubo-trace banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "UBO Trace Engine".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   UBO Trace Engine v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print one stage line of a trace report
    pub fn stage(&self, result: &StageResult) {
        let counts = format!(
            "{} direct, {} indirect, {} urls, {} attempt(s), {}ms",
            result.direct_facts.len(),
            result.indirect_facts.len(),
            result.urls.len(),
            result.attempt_count,
            result.processing_time_ms
        );
        let label = format!("Stage {} {}", result.stage_id, result.stage_id.description());

        match (result.status, self.colored) {
            (StageStatus::Failed, true) => {
                println!("  {} {} {}", "✗".red().bold(), label.red(), counts.dimmed())
            }
            (StageStatus::Failed, false) => println!("  [FAILED] {} ({})", label, counts),
            (_, true) => println!("  {} {} {}", "✓".green().bold(), label, counts.dimmed()),
            (_, false) => println!("  [OK] {} ({})", label, counts),
        }
    }

    /// Print the connection verdict of a finished trace
    pub fn verdict(&self, summary: &TraceSummary) {
        let label = summary.connection_status.label();
        if !self.colored {
            println!("\n  VERDICT: {}", label);
            return;
        }

        let styled = match summary.connection_status {
            ConnectionStatus::DirectConnection => label.bright_red().bold().to_string(),
            ConnectionStatus::IndirectConnectionOnly => label.yellow().bold().to_string(),
            ConnectionStatus::NoConnection => label.green().bold().to_string(),
        };
        println!("\n  {} {}", "VERDICT:".bright_white().bold(), styled);
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}
