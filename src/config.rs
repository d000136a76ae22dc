use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = "praw_bot";
pub const DEFAULT_SUBREDDIT: &str = "LocalLLaMA";
pub const DEFAULT_LIMIT: usize = 3;

const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Client ID and Client Secret must be provided either as arguments or environment variables (REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET)."
    )]
    MissingCredentials,
}

/// Raw values as given on the command line, before env fallback.
#[derive(Debug, Default, Clone)]
pub struct ConfigArgs {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: Option<String>,
    pub subreddit: String,
    pub limit: usize,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

/// Fully resolved run configuration. Built once in `main`, read-only after.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub subreddit: String,
    pub limit: usize,
    pub out_dir: PathBuf,
}

impl Config {
    /// Resolve each credential as: explicit argument, then environment, then default.
    pub fn resolve<F>(args: ConfigArgs, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |arg: Option<String>, key: &str| {
            non_empty(arg).or_else(|| non_empty(env(key)))
        };

        let client_id = pick(args.client_id, ENV_CLIENT_ID);
        let client_secret = pick(args.client_secret, ENV_CLIENT_SECRET);
        let user_agent =
            pick(args.user_agent, ENV_USER_AGENT).unwrap_or_else(|| DEFAULT_USER_AGENT.into());

        let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
            return Err(ConfigError::MissingCredentials);
        };

        Ok(Config {
            credentials: Credentials {
                client_id,
                client_secret,
                user_agent,
            },
            subreddit: args.subreddit,
            limit: args.limit,
            out_dir: args.out_dir,
        })
    }

    pub fn from_process_env(args: ConfigArgs) -> Result<Self, ConfigError> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            subreddit: DEFAULT_SUBREDDIT.into(),
            limit: DEFAULT_LIMIT,
            out_dir: PathBuf::from("."),
            ..Default::default()
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_args_win_over_env() {
        let mut a = args();
        a.client_id = Some("arg-id".into());
        a.client_secret = Some("arg-secret".into());
        let env = env_of(&[(ENV_CLIENT_ID, "env-id"), (ENV_CLIENT_SECRET, "env-secret")]);

        let cfg = Config::resolve(a, env).unwrap();
        assert_eq!(cfg.credentials.client_id, "arg-id");
        assert_eq!(cfg.credentials.client_secret, "arg-secret");
    }

    #[test]
    fn env_fills_missing_args() {
        let mut a = args();
        a.client_id = Some("arg-id".into());
        let env = env_of(&[(ENV_CLIENT_SECRET, "env-secret"), (ENV_USER_AGENT, "my-agent")]);

        let cfg = Config::resolve(a, env).unwrap();
        assert_eq!(cfg.credentials.client_id, "arg-id");
        assert_eq!(cfg.credentials.client_secret, "env-secret");
        assert_eq!(cfg.credentials.user_agent, "my-agent");
    }

    #[test]
    fn user_agent_defaults_to_bot_label() {
        let env = env_of(&[(ENV_CLIENT_ID, "id"), (ENV_CLIENT_SECRET, "secret")]);
        let cfg = Config::resolve(args(), env).unwrap();
        assert_eq!(cfg.credentials.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.subreddit, DEFAULT_SUBREDDIT);
        assert_eq!(cfg.limit, 3);
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let err = Config::resolve(args(), env_of(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials);
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let mut a = args();
        a.client_id = Some("".into());
        a.client_secret = Some("secret".into());
        let err = Config::resolve(a, env_of(&[(ENV_CLIENT_ID, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingCredentials);
    }
}
