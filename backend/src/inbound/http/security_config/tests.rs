//! Unit tests for security configuration parsing.

use super::*;
use mockable::MockEnv;
use rstest::rstest;
use std::collections::HashMap;
use tempfile::NamedTempFile;

fn secret_file(contents: &[u8]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temporary file");
    std::fs::write(file.path(), contents).expect("write secret");
    file
}

fn path_of(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

fn mock_env(vars: HashMap<String, String>) -> MockEnv {
    let mut env = MockEnv::new();
    env.expect_string()
        .times(0..)
        .returning(move |key| vars.get(key).cloned());
    env
}

struct SecretFiles {
    jwt: NamedTempFile,
    field_key: NamedTempFile,
}

impl SecretFiles {
    fn valid() -> Self {
        Self {
            jwt: secret_file(&[b's'; 64]),
            field_key: secret_file(&[7_u8; FIELD_KEY_BYTES]),
        }
    }

    fn release_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert(JWT_SECRET_FILE_ENV.to_owned(), path_of(&self.jwt));
        vars.insert(FIELD_KEY_FILE_ENV.to_owned(), path_of(&self.field_key));
        vars.insert(COOKIE_SECURE_ENV.to_owned(), "1".to_owned());
        vars
    }
}

fn expect_error(
    result: Result<SecuritySettings, SecurityConfigError>,
    label: &str,
) -> SecurityConfigError {
    match result {
        Ok(_) => panic!("{label}"),
        Err(error) => error,
    }
}

#[rstest]
fn release_accepts_complete_configuration() {
    let files = SecretFiles::valid();
    let env = mock_env(files.release_vars());
    let settings = security_settings_from_env(&env, BuildMode::Release).expect("valid config");
    assert!(settings.cookie_secure);
    assert!(!settings.ephemeral);
    assert_eq!(settings.jwt_secret.len(), 64);
    assert_eq!(settings.field_key.as_slice(), &[7_u8; FIELD_KEY_BYTES]);
}

#[rstest]
fn release_missing_cookie_secure_is_rejected() {
    let files = SecretFiles::valid();
    let mut vars = files.release_vars();
    vars.remove(COOKIE_SECURE_ENV);
    let err = expect_error(
        security_settings_from_env(&mock_env(vars), BuildMode::Release),
        "expected missing cookie secure to fail",
    );
    assert!(matches!(
        err,
        SecurityConfigError::MissingEnv {
            name: COOKIE_SECURE_ENV
        }
    ));
}

#[rstest]
#[case("maybe")]
#[case("")]
fn release_invalid_cookie_secure_is_rejected(#[case] value: &str) {
    let files = SecretFiles::valid();
    let mut vars = files.release_vars();
    vars.insert(COOKIE_SECURE_ENV.to_owned(), value.to_owned());
    let err = expect_error(
        security_settings_from_env(&mock_env(vars), BuildMode::Release),
        "expected invalid cookie secure to fail",
    );
    assert!(matches!(err, SecurityConfigError::InvalidEnv { name, .. } if name == COOKIE_SECURE_ENV));
}

#[rstest]
#[case("0", false)]
#[case("no", false)]
#[case("TRUE", true)]
#[case("y", true)]
fn cookie_secure_accepts_boolean_spellings(#[case] value: &str, #[case] expected: bool) {
    let files = SecretFiles::valid();
    let mut vars = files.release_vars();
    vars.insert(COOKIE_SECURE_ENV.to_owned(), value.to_owned());
    let settings =
        security_settings_from_env(&mock_env(vars), BuildMode::Release).expect("valid config");
    assert_eq!(settings.cookie_secure, expected);
}

#[rstest]
fn debug_defaults_cookie_secure_to_true() {
    let env = mock_env(HashMap::new());
    let settings = security_settings_from_env(&env, BuildMode::Debug).expect("debug fallback");
    assert!(settings.cookie_secure);
}

#[rstest]
fn release_short_jwt_secret_is_rejected() {
    let files = SecretFiles::valid();
    let short = secret_file(&[b's'; JWT_SECRET_MIN_LEN - 1]);
    let mut vars = files.release_vars();
    vars.insert(JWT_SECRET_FILE_ENV.to_owned(), path_of(&short));
    let err = expect_error(
        security_settings_from_env(&mock_env(vars), BuildMode::Release),
        "expected short secret to fail",
    );
    assert!(matches!(
        err,
        SecurityConfigError::KeyTooShort { length, min_len, .. }
            if length == JWT_SECRET_MIN_LEN - 1 && min_len == JWT_SECRET_MIN_LEN
    ));
}

#[rstest]
fn debug_accepts_short_jwt_secret() {
    let files = SecretFiles::valid();
    let short = secret_file(b"dev");
    let mut vars = files.release_vars();
    vars.insert(JWT_SECRET_FILE_ENV.to_owned(), path_of(&short));
    let settings =
        security_settings_from_env(&mock_env(vars), BuildMode::Debug).expect("debug tolerates");
    assert_eq!(settings.jwt_secret.as_slice(), b"dev");
    assert!(!settings.ephemeral);
}

#[rstest]
fn release_missing_jwt_secret_is_rejected() {
    let files = SecretFiles::valid();
    let mut vars = files.release_vars();
    vars.insert(
        JWT_SECRET_FILE_ENV.to_owned(),
        "/nonexistent/medisecure/jwt".to_owned(),
    );
    let err = expect_error(
        security_settings_from_env(&mock_env(vars), BuildMode::Release),
        "expected missing secret to fail",
    );
    assert!(matches!(err, SecurityConfigError::KeyRead { .. }));
}

#[rstest]
fn release_allows_ephemeral_secrets_when_opted_in() {
    let mut vars = HashMap::new();
    vars.insert(COOKIE_SECURE_ENV.to_owned(), "1".to_owned());
    vars.insert(ALLOW_EPHEMERAL_ENV.to_owned(), "1".to_owned());
    vars.insert(JWT_SECRET_FILE_ENV.to_owned(), "/nonexistent/jwt".to_owned());
    vars.insert(FIELD_KEY_FILE_ENV.to_owned(), "/nonexistent/key".to_owned());
    let settings =
        security_settings_from_env(&mock_env(vars), BuildMode::Release).expect("ephemeral");
    assert!(settings.ephemeral);
    assert_eq!(settings.jwt_secret.len(), EPHEMERAL_SECRET_LEN);
    assert_eq!(settings.field_key.len(), FIELD_KEY_BYTES);
}

#[rstest]
fn field_key_accepts_hex_with_trailing_newline() {
    let files = SecretFiles::valid();
    let hex_key = secret_file(format!("{}\n", "ab".repeat(FIELD_KEY_BYTES)).as_bytes());
    let mut vars = files.release_vars();
    vars.insert(FIELD_KEY_FILE_ENV.to_owned(), path_of(&hex_key));
    let settings =
        security_settings_from_env(&mock_env(vars), BuildMode::Release).expect("hex key");
    assert_eq!(settings.field_key.as_slice(), &[0xab_u8; FIELD_KEY_BYTES]);
}

#[rstest]
#[case(b"too short".to_vec())]
#[case("zz".repeat(FIELD_KEY_BYTES).into_bytes())]
fn release_malformed_field_key_is_rejected(#[case] contents: Vec<u8>) {
    let files = SecretFiles::valid();
    let bad = secret_file(&contents);
    let mut vars = files.release_vars();
    vars.insert(FIELD_KEY_FILE_ENV.to_owned(), path_of(&bad));
    let err = expect_error(
        security_settings_from_env(&mock_env(vars), BuildMode::Release),
        "expected malformed key to fail",
    );
    assert!(matches!(err, SecurityConfigError::MalformedFieldKey { .. }));
}

#[rstest]
fn debug_replaces_malformed_field_key() {
    let files = SecretFiles::valid();
    let bad = secret_file(b"too short");
    let mut vars = files.release_vars();
    vars.insert(FIELD_KEY_FILE_ENV.to_owned(), path_of(&bad));
    let settings =
        security_settings_from_env(&mock_env(vars), BuildMode::Debug).expect("debug fallback");
    assert!(settings.ephemeral);
    assert_eq!(settings.field_key.len(), FIELD_KEY_BYTES);
}

#[rstest]
fn debug_output_redacts_secrets() {
    let files = SecretFiles::valid();
    let settings = security_settings_from_env(&mock_env(files.release_vars()), BuildMode::Release)
        .expect("valid config");
    let rendered = format!("{settings:?}");
    assert!(rendered.contains("<redacted>"));
    assert!(!rendered.contains("115"));
}
