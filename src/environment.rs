use std::env;
use std::str::FromStr;
use tokio::time::Duration;
use tracing::warn;

/// Default identity of the recent-changes relay on the chat network.
pub const DEFAULT_RELAY_NICK: &str = "rc-pmtpa";

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// Empty segments are dropped, so an unset variable yields an empty vector.
///
/// # Arguments
/// - `var`: The name of the environment variable.
/// - `delimiter`: The character to split the environment variable's value by.
///
/// # Returns
/// - `Vec<String>`
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads and parses an environment variable, falling back to `default` when it
/// is unset or does not parse.
pub fn get_env_var_or<T: FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Ignoring unparsable value {:?} for {}", value, var);
                default
            }
        },
        Err(_) => default,
    }
}

/// Reads an optional secret such as an API token; blank values count as unset.
pub fn get_env_var_opt(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub relay_nick: String,
    /// Language codes to monitor; empty means every known edition.
    pub monitored_languages: Vec<String>,
    pub discard_bots: bool,
    pub seconds_since_last_edit: u64,
    pub seconds_between_edits: u64,
    pub breaking_news_threshold: u64,
    pub number_of_concurrent_editors: u64,
    pub sweep_interval: Duration,
    pub request_timeout: Duration,
    pub max_social_results: usize,
    pub twitter_bearer_token: Option<String>,
    pub facebook_access_token: Option<String>,
    pub google_key: Option<String>,
    pub announcement_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay_nick: DEFAULT_RELAY_NICK.to_string(),
            monitored_languages: Vec::new(),
            discard_bots: true,
            seconds_since_last_edit: 240,
            seconds_between_edits: 60,
            breaking_news_threshold: 5,
            number_of_concurrent_editors: 2,
            sweep_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            max_social_results: 2,
            twitter_bearer_token: None,
            facebook_access_token: None,
            google_key: None,
            announcement_buffer: 10,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            relay_nick: get_env_var_or("RELAY_NICK", defaults.relay_nick),
            monitored_languages: get_env_var_as_vec("MONITORED_LANGUAGES", ';'),
            discard_bots: get_env_var_or("DISCARD_BOTS", defaults.discard_bots),
            seconds_since_last_edit: get_env_var_or(
                "SECONDS_SINCE_LAST_EDIT",
                defaults.seconds_since_last_edit,
            ),
            seconds_between_edits: get_env_var_or(
                "SECONDS_BETWEEN_EDITS",
                defaults.seconds_between_edits,
            ),
            breaking_news_threshold: get_env_var_or(
                "BREAKING_NEWS_THRESHOLD",
                defaults.breaking_news_threshold,
            ),
            number_of_concurrent_editors: get_env_var_or(
                "NUMBER_OF_CONCURRENT_EDITORS",
                defaults.number_of_concurrent_editors,
            ),
            sweep_interval: Duration::from_secs(get_env_var_or(
                "SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval.as_secs(),
            )),
            request_timeout: Duration::from_secs(get_env_var_or(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout.as_secs(),
            )),
            max_social_results: get_env_var_or("MAX_SOCIAL_RESULTS", defaults.max_social_results),
            twitter_bearer_token: get_env_var_opt("TWITTER_BEARER_TOKEN"),
            facebook_access_token: get_env_var_opt("FACEBOOK_ACCESS_TOKEN"),
            google_key: get_env_var_opt("GOOGLE_KEY"),
            announcement_buffer: get_env_var_or(
                "ANNOUNCEMENT_BUFFER",
                defaults.announcement_buffer,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_as_vec_drops_empty_segments() {
        env::set_var("WIKIPULSE_TEST_LANGS", " en; de;;fr ;");
        assert_eq!(
            get_env_var_as_vec("WIKIPULSE_TEST_LANGS", ';'),
            vec!["en", "de", "fr"]
        );
        assert!(get_env_var_as_vec("WIKIPULSE_TEST_UNSET_VAR", ';').is_empty());
    }

    #[test]
    fn test_env_var_or_falls_back_on_garbage() {
        env::set_var("WIKIPULSE_TEST_THRESHOLD", "seven");
        assert_eq!(get_env_var_or("WIKIPULSE_TEST_THRESHOLD", 5u64), 5);
        env::set_var("WIKIPULSE_TEST_THRESHOLD_OK", " 7 ");
        assert_eq!(get_env_var_or("WIKIPULSE_TEST_THRESHOLD_OK", 5u64), 7);
    }

    #[test]
    fn test_blank_secret_is_unset() {
        env::set_var("WIKIPULSE_TEST_TOKEN", "   ");
        assert_eq!(get_env_var_opt("WIKIPULSE_TEST_TOKEN"), None);
    }
}
