use colored::Colorize;
use testing::RunReport;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Per-phase summary, colored by outcome.
pub fn report(report: &RunReport) {
    header("Run summary");
    for line in report.to_string().lines() {
        let trimmed = line.trim_start();
        let line = if trimmed.starts_with("passed") {
            line.green()
        } else if trimmed.starts_with("skipped") {
            line.yellow()
        } else {
            line.red()
        };
        println!("{}", line);
    }

    for phase in report.teardown_failures() {
        warn(&format!("Teardown phase '{}' failed; the verdict is unaffected", phase));
    }
}
