use tracing::warn;

/// Interpret a string value such as "1" or "no" as a boolean.
///
/// Returns `None` if the value is not recognized.
pub fn str_as_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Return whether a feature flag controlled by an environment variable is
/// enabled.
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => str_as_bool(&value).unwrap_or_else(|| {
            warn!("Unrecognized boolean value \"{}\" for {}", value, name);
            default
        }),
        Err(_) => default,
    }
}

/// Read a non-negative integer from an environment variable.
pub fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Unrecognized integer value \"{}\" for {}", value, name);
            default
        }),
        Err(_) => default,
    }
}
