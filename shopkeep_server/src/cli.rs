use std::{env, env::VarError};

/// There are no command line options. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "SK_HOST",
        "SK_PORT",
        "SK_DATABASE_URL",
        "SK_DB_MAX_CONNECTIONS",
        "SK_SHIPPER_HMAC_CHECKS",
        "SK_SWEEP_INTERVAL_SECS",
        "SK_EVENT_BUFFER_SIZE",
        "SK_USE_SHIPPER",
        "SK_PAYGATE_URL",
        "SK_PAYGATE_TIMEOUT",
        "SK_SHIPPER_URL",
        "SK_SHIPPER_TIMEOUT",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
