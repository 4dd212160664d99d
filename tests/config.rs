// tests/config.rs
use std::time::Duration;
use std::{env, fs};

use auction_monitor::config::MonitorConfig;

const ENV_KEYS: [&str; 4] = [
    "MONITOR_CONFIG_PATH",
    "MONITOR_API_BASE_URL",
    "MONITOR_STATS_INTERVAL_SECS",
    "MONITOR_STATE_DIR",
];

fn clear_env() {
    for k in ENV_KEYS {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn load_uses_env_path_then_fallbacks() {
    clear_env();
    // isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) nothing on disk: defaults
    let cfg = MonitorConfig::load().unwrap();
    assert_eq!(cfg, MonitorConfig::default());
    assert_eq!(cfg.items_per_page, 100);
    assert_eq!(cfg.max_item_pages, 50);
    assert_eq!(cfg.stats_interval(), Duration::from_secs(15));

    // 2) fallback TOML in ./config/
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/monitor.toml"),
        "items_interval_secs = 60\nsession_page_size = 10\n",
    )
    .unwrap();
    let cfg = MonitorConfig::load().unwrap();
    assert_eq!(cfg.items_interval(), Duration::from_secs(60));
    assert_eq!(cfg.session_page_size, 10);

    // 3) explicit path wins
    let explicit = tmp.path().join("other.toml");
    fs::write(&explicit, "api_base_url = \"http://scraper:9000/api/v1\"\n").unwrap();
    env::set_var("MONITOR_CONFIG_PATH", explicit.display().to_string());
    let cfg = MonitorConfig::load().unwrap();
    assert_eq!(cfg.api_base_url, "http://scraper:9000/api/v1");
    assert_eq!(cfg.items_interval_secs, 30);

    // 4) a dangling explicit path is an error
    env::set_var("MONITOR_CONFIG_PATH", tmp.path().join("nope.toml").display().to_string());
    assert!(MonitorConfig::load().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_on_top_of_file() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("monitor.toml");
    fs::write(&p, "stats_interval_secs = 45\n").unwrap();

    env::set_var("MONITOR_STATS_INTERVAL_SECS", "5");
    env::set_var("MONITOR_API_BASE_URL", "http://10.0.0.2:8000/api/v1");
    env::set_var("MONITOR_STATE_DIR", "/var/lib/auction-monitor");
    let cfg = MonitorConfig::load_from(&p).unwrap();
    assert_eq!(cfg.stats_interval_secs, 5);
    assert_eq!(cfg.api_base_url, "http://10.0.0.2:8000/api/v1");
    assert_eq!(cfg.state_dir, std::path::PathBuf::from("/var/lib/auction-monitor"));

    // unparsable numbers are ignored
    env::set_var("MONITOR_STATS_INTERVAL_SECS", "soon");
    assert_eq!(MonitorConfig::load_from(&p).unwrap().stats_interval_secs, 45);

    fs::write(&p, "stats_interval_secs = \"fast\"\n").unwrap();
    assert!(MonitorConfig::load_from(&p).is_err());
    clear_env();
}
