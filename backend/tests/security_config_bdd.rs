//! Behaviour tests for security material loading.
//!
//! These scenarios validate that release builds enforce explicit
//! configuration and that ephemeral secrets are only used when allowed.

use medisecure::inbound::http::security_config::{
    ALLOW_EPHEMERAL_ENV, BuildMode, COOKIE_SECURE_ENV, FIELD_KEY_FILE_ENV, JWT_SECRET_FILE_ENV,
    SecurityConfigError, SecuritySettings, security_settings_from_env,
};
use mockable::MockEnv;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::collections::HashMap;
use tempfile::NamedTempFile;

struct SecurityConfigWorld {
    vars: RefCell<HashMap<String, String>>,
    mode: RefCell<BuildMode>,
    outcome: RefCell<Option<Result<SecuritySettings, SecurityConfigError>>>,
    files: RefCell<Vec<NamedTempFile>>,
}

impl SecurityConfigWorld {
    fn new() -> Self {
        Self {
            vars: RefCell::new(HashMap::new()),
            mode: RefCell::new(BuildMode::Release),
            outcome: RefCell::new(None),
            files: RefCell::new(Vec::new()),
        }
    }

    fn set_mode(&self, mode: BuildMode) {
        *self.mode.borrow_mut() = mode;
    }

    fn set_env_var(&self, name: &str, value: &str) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    fn add_file(&self, env_name: &str, len: usize) {
        self.add_file_with(env_name, &vec![b'a'; len]);
    }

    fn add_file_with(&self, env_name: &str, contents: &[u8]) {
        let file = NamedTempFile::new().expect("temporary file");
        std::fs::write(file.path(), contents).expect("write secret");
        let path = file.path().to_string_lossy().into_owned();
        self.set_env_var(env_name, &path);
        self.files.borrow_mut().push(file);
    }

    fn evaluate(&self) {
        let env = mock_env(self.vars.borrow().clone());
        let mode = *self.mode.borrow();
        let result = security_settings_from_env(&env, mode);
        *self.outcome.borrow_mut() = Some(result);
    }

    fn with_settings<F>(&self, f: F)
    where
        F: FnOnce(&SecuritySettings),
    {
        let outcome = self.outcome.borrow();
        let settings = outcome
            .as_ref()
            .expect("evaluation result")
            .as_ref()
            .expect("expected settings to succeed");
        f(settings);
    }

    fn with_error<F>(&self, f: F)
    where
        F: FnOnce(&SecurityConfigError),
    {
        let outcome = self.outcome.borrow();
        let error = match outcome.as_ref().expect("evaluation result") {
            Ok(_) => panic!("expected settings to fail"),
            Err(error) => error,
        };
        f(error);
    }
}

fn mock_env(vars: HashMap<String, String>) -> MockEnv {
    let mut env = MockEnv::new();
    env.expect_string()
        .times(0..)
        .returning(move |key| vars.get(key).cloned());
    env
}

#[fixture]
fn world() -> SecurityConfigWorld {
    SecurityConfigWorld::new()
}

#[given("a release build configuration")]
fn a_release_build_configuration(world: &SecurityConfigWorld) {
    world.set_mode(BuildMode::Release);
}

#[given("a debug build configuration")]
fn a_debug_build_configuration(world: &SecurityConfigWorld) {
    world.set_mode(BuildMode::Debug);
}

#[given("COOKIE_SECURE is set to {value}")]
fn cookie_secure_is_set(world: &SecurityConfigWorld, value: String) {
    world.set_env_var(COOKIE_SECURE_ENV, &value);
}

#[given("AUTH_ALLOW_EPHEMERAL is set to {value}")]
fn allow_ephemeral_is_set(world: &SecurityConfigWorld, value: String) {
    world.set_env_var(ALLOW_EPHEMERAL_ENV, &value);
}

#[given("a signing secret file with {len} bytes")]
fn a_signing_secret_file(world: &SecurityConfigWorld, len: usize) {
    world.add_file(JWT_SECRET_FILE_ENV, len);
}

#[given("a field key file with {len} bytes")]
fn a_field_key_file(world: &SecurityConfigWorld, len: usize) {
    world.add_file(FIELD_KEY_FILE_ENV, len);
}

#[given("a field key file with {len} characters that are not hex")]
fn a_non_hex_field_key_file(world: &SecurityConfigWorld, len: usize) {
    world.add_file_with(FIELD_KEY_FILE_ENV, &vec![b'z'; len]);
}

#[given("the secret files point nowhere")]
fn the_secret_files_point_nowhere(world: &SecurityConfigWorld) {
    let dir = std::env::temp_dir().join("medisecure-missing-secrets");
    world.set_env_var(
        JWT_SECRET_FILE_ENV,
        &dir.join("jwt_secret").to_string_lossy(),
    );
    world.set_env_var(
        FIELD_KEY_FILE_ENV,
        &dir.join("field_key").to_string_lossy(),
    );
}

#[when("the security configuration is loaded")]
fn the_security_configuration_is_loaded(world: &SecurityConfigWorld) {
    world.evaluate();
}

#[then("the configuration load succeeds")]
fn the_configuration_load_succeeds(world: &SecurityConfigWorld) {
    world.with_settings(|_| {});
}

#[then("the cookie secure flag is true")]
fn the_cookie_secure_flag_is_true(world: &SecurityConfigWorld) {
    world.with_settings(|settings| {
        assert!(settings.cookie_secure);
    });
}

#[then("the secrets are not ephemeral")]
fn the_secrets_are_not_ephemeral(world: &SecurityConfigWorld) {
    world.with_settings(|settings| {
        assert!(!settings.ephemeral);
        assert_eq!(settings.jwt_secret.len(), 64);
    });
}

#[then("the secrets are ephemeral")]
fn the_secrets_are_ephemeral(world: &SecurityConfigWorld) {
    world.with_settings(|settings| {
        assert!(settings.ephemeral);
        assert_eq!(settings.field_key.len(), 32);
    });
}

#[then("the configuration load fails due to missing COOKIE_SECURE")]
fn configuration_fails_missing_cookie_secure(world: &SecurityConfigWorld) {
    world.with_error(|error| {
        assert!(matches!(
            error,
            SecurityConfigError::MissingEnv {
                name: COOKIE_SECURE_ENV
            }
        ));
    });
}

#[then("the configuration load fails because the signing secret is too short")]
fn configuration_fails_secret_too_short(world: &SecurityConfigWorld) {
    world.with_error(|error| {
        assert!(matches!(
            error,
            SecurityConfigError::KeyTooShort { length: 16, .. }
        ));
    });
}

#[then("the configuration load fails because the field key is malformed")]
fn configuration_fails_malformed_field_key(world: &SecurityConfigWorld) {
    world.with_error(|error| {
        assert!(matches!(error, SecurityConfigError::MalformedFieldKey { .. }));
    });
}

#[then("the configuration load fails because a secret cannot be read")]
fn configuration_fails_unreadable_secret(world: &SecurityConfigWorld) {
    world.with_error(|error| {
        assert!(matches!(error, SecurityConfigError::KeyRead { .. }));
    });
}

#[then("the configuration load fails because the signing secret cannot be read")]
fn configuration_fails_unreadable_signing_secret(world: &SecurityConfigWorld) {
    world.with_error(|error| match error {
        SecurityConfigError::KeyRead { path, .. } => {
            assert_eq!(
                path.file_name().and_then(|name| name.to_str()),
                Some("jwt_secret")
            );
        }
        other => panic!("expected an unreadable signing secret, got {other:?}"),
    });
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build with complete material"
)]
fn release_build_with_complete_material(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build without the cookie toggle"
)]
fn release_build_without_the_cookie_toggle(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build with a short signing secret"
)]
fn release_build_with_a_short_signing_secret(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build with a malformed field key"
)]
fn release_build_with_a_malformed_field_key(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build with missing secrets"
)]
fn release_build_with_missing_secrets(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build opting into ephemeral secrets"
)]
fn release_build_opting_into_ephemeral_secrets(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Debug build falls back to temporary secrets"
)]
fn debug_build_falls_back_to_temporary_secrets(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build without a signing secret"
)]
fn release_build_without_a_signing_secret(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Release build with a field key that is not hex"
)]
fn release_build_with_a_field_key_that_is_not_hex(world: SecurityConfigWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/security_config.feature",
    name = "Debug build replaces a malformed field key"
)]
fn debug_build_replaces_a_malformed_field_key(world: SecurityConfigWorld) {
    drop(world);
}
