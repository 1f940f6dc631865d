//! Config and secrets loading from disk.

use std::fs;
use std::io::Write;

use visage::config::ApiKeySecret;
use visage::{AvatarService, AvatarSource, Config, Secrets};

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn load_explicit_config_file() {
    let file = write_temp(
        r#"
        [provider]
        steps = 20

        [durable]
        delivery_base = "https://cdn.example/avatars"
        upload_url = "https://cdn.example/upload"
        timeout_secs = 3

        [cache]
        max_entries = 64
        "#,
    );

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.provider.steps, 20);
    assert_eq!(config.provider.timeout_secs, 15);
    assert_eq!(config.durable.as_ref().unwrap().timeout_secs, 3);
    assert_eq!(config.cache.max_entries, 64);
}

#[test]
fn malformed_config_is_a_configuration_error() {
    let file = write_temp("[provider\nsteps = ");
    let err = Config::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[cfg(unix)]
#[test]
fn secrets_require_private_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let file = write_temp("[together]\napi_key = \"tg-key\"\n");

    fs::set_permissions(file.path(), fs::Permissions::from_mode(0o644)).unwrap();
    let err = Secrets::load_from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("insecure permissions"));

    fs::set_permissions(file.path(), fs::Permissions::from_mode(0o600)).unwrap();
    let secrets = Secrets::load_from_file(file.path()).unwrap();
    assert_eq!(secrets.api_key("together").as_deref(), Some("tg-key"));
}

#[tokio::test]
async fn config_builds_a_working_service() {
    let config: Config = toml::from_str(
        r#"
        [placeholder]
        badge_base = ""
        initial_base = "https://initials.example/"
        "#,
    )
    .unwrap();

    let secrets = Secrets::default();
    let service = config.build_service(&secrets).unwrap();
    if !service.has_provider() {
        let avatar = service.acquire("Watson", None).await;
        assert_eq!(avatar.source, AvatarSource::Placeholder);
        assert!(avatar.url.starts_with("https://initials.example/W"));
    }
}

#[test]
fn provider_enabled_by_together_key() {
    let config = Config::default();
    let secrets = Secrets {
        together: Some(ApiKeySecret {
            api_key: "tg-key".to_string(),
        }),
        ..Default::default()
    };
    let service = AvatarService::from_config(&config, &secrets).unwrap();
    assert!(service.has_provider());
}
