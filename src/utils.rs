use chrono::{DateTime, Utc};

pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}

pub fn format_preference_key(prefix: &str, module: &str) -> String {
    format!("{}::{}", prefix, module)
}
