//! API key lookup for the classification backend

use ixen_core::{IxenError, Result};
use std::env;

/// Read the API key from the environment variable named in the config
///
/// Blank values count as missing.
pub fn get_api_key(var: &str) -> Result<String> {
    match env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(IxenError::Auth(format!(
            "No API key found. Set {}=sk-ant-api03-... or use the heuristic classifier \
             (classifier.backend = \"heuristic\")",
            var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_var<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var(key).ok();

        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }

        let result = f();

        match original {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
        result
    }

    #[test]
    fn test_key_from_named_var() {
        with_env_var("IXEN_TEST_KEY_A", Some(" sk-ant-test "), || {
            assert_eq!(get_api_key("IXEN_TEST_KEY_A").unwrap(), "sk-ant-test");
        });
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        with_env_var("IXEN_TEST_KEY_B", None, || {
            let err = get_api_key("IXEN_TEST_KEY_B").unwrap_err();
            assert!(matches!(err, IxenError::Auth(_)));
            assert!(err.to_string().contains("IXEN_TEST_KEY_B"));
        });
    }

    #[test]
    fn test_blank_key_is_missing() {
        with_env_var("IXEN_TEST_KEY_C", Some("   "), || {
            assert!(get_api_key("IXEN_TEST_KEY_C").is_err());
        });
    }
}
