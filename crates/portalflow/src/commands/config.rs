use colored::Colorize;
use portalflow_config::PortalConfig;

pub fn handle(config: &PortalConfig) {
    match &config.source {
        Some(path) => println!("{} {}", "Config:".bold(), path.display()),
        None => println!("{} {}", "Config:".bold(), "environment only".dimmed()),
    }
    println!("  api_url:              {}", config.api_url.cyan());
    println!("  token:                {}", mask(&config.token).dimmed());
    println!(
        "  financial_project_id: {}",
        config.financial_project_id.as_deref().unwrap_or("-")
    );
    println!(
        "  request_timeout:      {}",
        config
            .request_timeout_secs
            .map(|t| format!("{}s", t))
            .unwrap_or_else(|| "default".to_string())
    );
    println!(
        "  poll:                 every {}s, at most {} polls{}",
        config.poll.interval_secs,
        config.poll.max_attempts,
        config
            .poll
            .timeout_secs
            .map(|t| format!(", timeout {}s", t))
            .unwrap_or_default()
    );
}

/// Keep only the last four characters of a secret
fn mask(secret: &str) -> String {
    let visible: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "****");
        assert_eq!(mask("secret-token-1234"), "****1234");
    }
}
