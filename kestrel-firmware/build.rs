//! Build script for kestrel-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates printer.cfg at compile time with the same loader the
//!   firmware runs

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate printer.cfg, the document embedded as the boot fallback
fn validate_config() {
    println!("cargo:rerun-if-changed=printer.cfg");

    let config_path = Path::new("printer.cfg");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: printer.cfg not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds printer.cfg as its default configuration.   ║\n\
            ║  Please create one in the kestrel-firmware directory.            ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let text = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read printer.cfg                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config = match kestrel_core::load(&text) {
        Ok(config) => config,
        Err(e) => {
            let source_line = text
                .lines()
                .nth(e.line().saturating_sub(1))
                .unwrap_or_default()
                .trim();
            let details = format!("{}\nline {}: {}", e, e.line(), source_line);
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid printer.cfg                                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&details)
            );
        }
    };

    println!(
        "cargo:warning=printer.cfg validated: {} sections, {} calibration values",
        config.sections().len(),
        config
            .overlay()
            .sections()
            .iter()
            .map(|s| s.options.len())
            .sum::<usize>()
    );
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.chars().count() > 64 {
                format!("{}...", line.chars().take(61).collect::<String>())
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
