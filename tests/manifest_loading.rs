// tests/manifest_loading.rs

use std::io::Write;
use std::time::Duration;

use stackup::config::load_and_validate;
use stackup::config::model::HealthcheckKind;
use stackup::errors::StackError;
use stackup_test_utils::builders::{ServiceConfigBuilder, StackFileBuilder};
use tempfile::NamedTempFile;

fn manifest(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn loads_a_compose_style_manifest() {
    let file = manifest(
        r#"
[defaults]
startup_timeout = "30s"
probe_interval = "250ms"

[[service]]
name = "db"
start = "docker start -a stack-db"
stop = "docker stop stack-db"
healthcheck = { cmd = "pg_isready -h localhost" }

[[service]]
name = "api"
depends_on = ["db"]
start = "./api"
healthcheck = { http = "http://localhost:8080/health" }
probe_retries = 10

[[service]]
name = "web"
depends_on = ["api"]
start = "./web"
"#,
    );

    let stack = load_and_validate(file.path()).unwrap();

    assert_eq!(stack.service.len(), 3);
    assert_eq!(stack.defaults.startup_timeout.0, Duration::from_secs(30));
    assert_eq!(stack.defaults.probe_retries, 30);

    let api = &stack.service[1];
    assert_eq!(
        api.healthcheck.as_ref().and_then(|hc| hc.kind()),
        Some(HealthcheckKind::Http("http://localhost:8080/health"))
    );
    let policy = stack.policy_for(api);
    assert_eq!(policy.probe_retries, 10);
    assert_eq!(policy.probe_interval, Duration::from_millis(250));
    assert_eq!(policy.probe_timeout, Duration::from_secs(5));

    assert_eq!(stack.start_order().unwrap(), vec!["db", "api", "web"]);
    let decl = stack.declaration().unwrap();
    assert_eq!(decl.len(), 3);
    assert_eq!(decl[2].depends_on, vec!["api".to_string()]);
}

#[test]
fn cycle_returns_structured_error() {
    let file = manifest(
        r#"
[[service]]
name = "a"
start = "echo a"
depends_on = ["b"]

[[service]]
name = "b"
start = "echo b"
depends_on = ["a"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(StackError::Cycle(path)) => assert_eq!(path, vec!["a", "b"]),
        Err(e) => panic!("Expected Cycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_dependency_is_reported() {
    let file = manifest(
        r#"
[[service]]
name = "api"
start = "./api"
depends_on = ["db"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(StackError::UnknownDependency { service, dependency }) => {
            assert_eq!(service, "api");
            assert_eq!(dependency, "db");
        }
        other => panic!("Expected UnknownDependency, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn duplicate_service_is_reported() {
    let file = manifest(
        r#"
[[service]]
name = "db"
start = "./db"

[[service]]
name = "db"
start = "./db --replica"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(StackError::DuplicateName(name)) if name == "db"
    ));
}

#[test]
fn policy_and_healthcheck_mistakes_are_config_errors() {
    let cases = [
        (
            r#"
[defaults]
probe_retries = 0

[[service]]
name = "db"
start = "./db"
"#,
            "probe_retries",
        ),
        (
            r#"
[[service]]
name = "db"
start = "./db"
healthcheck = { cmd = "true", tcp = "127.0.0.1:5432" }
"#,
            "exactly one",
        ),
        (
            r#"
[[service]]
name = "db"
start = "./db"
healthcheck = { log = "ready (" }
"#,
            "log pattern",
        ),
        (
            r#"
[[service]]
name = "db"
start = "   "
"#,
            "empty `start`",
        ),
        (
            r#"
[[service]]
name = "api"
start = "./api"
healthcheck = { http = "not a url" }
"#,
            "invalid healthcheck url",
        ),
        ("[defaults]\n", "at least one"),
    ];

    for (contents, needle) in cases {
        let file = manifest(contents);
        match load_and_validate(file.path()) {
            Err(StackError::Config(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("expected config error for {needle:?}, got {:?}", other.map(|_| ())),
        }
    }
}

#[test]
fn malformed_toml_is_a_toml_error() {
    for contents in [
        "[[service]]\nname = \"db\"\nstart = \"./db\"\nstartup_timeout = \"5 days\"\n",
        "[[service]]\nname = \"db\"\nstart = \"./db\"\nrestart = \"always\"\n",
        "[defaults]\nprobe_timeout = \"99999999999999999h\"\n\
         [[service]]\nname = \"db\"\nstart = \"./db\"\n",
        "[[service]\n",
    ] {
        let file = manifest(contents);
        assert!(
            matches!(load_and_validate(file.path()), Err(StackError::Toml(_))),
            "{contents}"
        );
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("Stackup.toml")).unwrap_err();
    assert!(matches!(err, StackError::Io(_)));
}

#[test]
fn builder_manifest_matches_file_semantics() {
    let stack = StackFileBuilder::new()
        .probe_interval(Duration::from_millis(20))
        .with_service(
            ServiceConfigBuilder::new("web", "./web")
                .depends_on("db")
                .healthcheck_log("listening on")
                .build(),
        )
        .with_service(ServiceConfigBuilder::new("db", "./db").stop("./db stop").build())
        .build();

    assert_eq!(stack.start_order().unwrap(), vec!["db", "web"]);
    assert_eq!(stack.policy_for(&stack.service[0]).probe_interval, Duration::from_millis(20));

    let raw = StackFileBuilder::new()
        .with_service(
            ServiceConfigBuilder::new("web", "./web")
                .detach(true)
                .healthcheck_log("listening on")
                .build(),
        )
        .build_raw();
    assert!(matches!(
        stackup::config::model::StackFile::try_from(raw),
        Err(StackError::Config(msg)) if msg.contains("foreground")
    ));
}
