// tests/config_files.rs
//
// Config loading from disk and the environment.
// Env-mutating tests are #[serial] so they don't race each other.

use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use sports_news_analyzer::classify::{Category, Classifier};
use sports_news_analyzer::config::AppConfig;
use sports_news_analyzer::progress::CancelPolicy;

fn temp_with(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("temp file");
    f.write_all(contents.as_bytes()).expect("write temp");
    f
}

const ENV_KEYS: &[&str] = &[
    "APP_CONFIG_PATH",
    "LLM_API_URL",
    "LLM_API_KEY",
    "LLM_MODEL",
    "LLM_ENABLED",
    "HUPU_BASE_URL",
    "HUPU_API_BASE_URL",
    "HUPU_MOBILE_BASE_URL",
];

fn clear_env() {
    for k in ENV_KEYS {
        std::env::remove_var(k);
    }
}

#[test]
fn shipped_config_files_parse() {
    let app = AppConfig::load_from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/app.toml"))
        .expect("shipped app.toml");
    assert_eq!(app.retriever.limit, 5);
    assert_eq!(app.stream.cancel, CancelPolicy::Detach);

    let kw = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/keywords.toml"))
        .expect("shipped keywords.toml");
    let shipped = Classifier::from_toml_str(&kw).expect("parse keywords.toml");
    let seed = Classifier::default_seed();
    assert_eq!(shipped.threshold(), seed.threshold());
    assert_eq!(shipped.keyword_sets(), seed.keyword_sets());
}

#[test]
fn missing_file_yields_defaults_and_bad_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = AppConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.llm.model, "qwen3-max");

    let bad = temp_with("[llm]\ntimeout_secs = \"soon\"\n");
    let err = AppConfig::load_from_file(bad.path()).unwrap_err();
    assert!(format!("{err:#}").contains("app config"));
}

#[test]
fn keywords_file_falls_back_to_seed_when_invalid() {
    let bad = temp_with("threshold = 2\n");
    let c = Classifier::load_from_file(bad.path());
    assert_eq!(c.keyword_sets(), Classifier::default_seed().keyword_sets());

    let custom = temp_with(
        "threshold = 1\n[[categories]]\ncategory = \"esports\"\nkeywords = [\"KPL\"]\n",
    );
    let c = Classifier::load_from_file(custom.path());
    assert_eq!(c.threshold(), 1);
    assert_eq!(c.classify("", "kpl季后赛"), Category::Esports);
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let file = temp_with(
        "[llm]\nmodel = \"from-file\"\n[source]\nbase_url = \"https://file.example\"\n[retriever]\nlimit = 0\n",
    );
    std::env::set_var("APP_CONFIG_PATH", file.path());
    std::env::set_var("LLM_MODEL", "from-env");
    std::env::set_var("LLM_ENABLED", "false");
    std::env::set_var("HUPU_MOBILE_BASE_URL", "https://m.example");

    let cfg = AppConfig::load().expect("load");
    clear_env();

    assert_eq!(cfg.llm.model, "from-env");
    assert!(!cfg.llm.enabled);
    assert_eq!(cfg.source.base_url, "https://file.example");
    assert_eq!(cfg.source.mobile_base_url, "https://m.example");
    // sanitized back to the default
    assert_eq!(cfg.retriever.limit, 5);
}

#[test]
#[serial]
fn blank_env_values_are_ignored() {
    clear_env();
    std::env::set_var("APP_CONFIG_PATH", "/nonexistent/app.toml");
    std::env::set_var("LLM_API_KEY", "   ");
    let cfg = AppConfig::load().expect("load");
    clear_env();
    assert!(cfg.llm.api_key.is_empty());
}
