#![forbid(unsafe_code)]

fn main() {
    let integration = palette_forge::util::OutputIntegration::detect();
    if let Err(error) = palette_forge::run_from_env() {
        if integration.should_emit_json() {
            eprintln!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "error": error.to_string(),
                    "category": error.category(),
                    "exit_code": error.exit_code(),
                    "integration": integration,
                })
            );
        } else {
            eprintln!("{error}");
        }
        std::process::exit(error.exit_code());
    }
}
