//! Kernel build and release tool.
//!
//! Builds the kernel for one device, wraps the boot image in a flashable zip,
//! and uploads the result.

use kernel_bundler_release::cli;
use kernel_bundler_release::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Fatal errors are always shown, even with --quiet
            let output = OutputManager::new(false);
            output.error(&format!("Fatal error: {e}"));

            let tail = e.log_tail();
            if !tail.is_empty() {
                output.println("\nLast lines of the build log:");
                for line in tail {
                    output.indent(line);
                }
            }

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    output.indent(&suggestion);
                }
            }

            process::exit(1);
        }
    }
}
