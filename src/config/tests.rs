use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.jobs.ttl, Duration::from_secs(3600));
    assert_eq!(settings.jobs.sweep_interval, Duration::from_secs(60));
    assert_eq!(settings.jobs.poll_interval, Duration::from_millis(250));
    assert_eq!(
        settings.naming.name_template,
        NameTemplate::parse(DEFAULT_NAME_TEMPLATE).expect("template")
    );
    assert_eq!(settings.naming.fallback_primary, "documento");
    assert_eq!(settings.naming.list_separator, ", ");
    assert_eq!(settings.naming.list_conjunction, "e");
    assert_eq!(settings.naming.max_value_chars, None);
    assert_eq!(settings.conversion.timeout, Duration::from_secs(120));
    assert_eq!(settings.mail.transport, MailTransport::Smtp);
    assert!(settings.mail.smtp.is_none());
    assert_eq!(settings.mail.local_client.program, "powershell");
}

#[test]
fn default_conversion_chain_tries_libreoffice_first() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    let names: Vec<&str> = settings
        .conversion
        .backends
        .iter()
        .map(|backend| backend.name.as_str())
        .collect();
    assert_eq!(names, ["libreoffice", "docx2pdf"]);
    assert!(settings.conversion.backends[0]
        .args
        .iter()
        .any(|arg| arg == "{outdir}"));
}

#[test]
fn explicit_empty_backend_list_disables_conversion() {
    let mut raw = RawSettings::default();
    raw.conversion.backends = Some(Vec::new());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.conversion.backends.is_empty());
}

#[test]
fn backend_without_input_token_is_rejected() {
    let mut raw = RawSettings::default();
    raw.conversion.backends = Some(vec![RawBackendSettings {
        name: Some("broken".to_string()),
        program: Some(PathBuf::from("convert")),
        args: Some(vec!["--help".to_string()]),
    }]);
    let err = Settings::from_raw(raw).expect_err("missing input token");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "conversion.backends.args",
            ..
        }
    ));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.jobs.poll_interval_ms = Some(1000);

    let overrides = RunOverrides {
        logging: LoggingOverrides {
            log_level: Some("debug".to_string()),
            log_json: Some(true),
        },
        jobs_poll_interval_ms: Some(50),
        ..Default::default()
    };

    raw.apply_run_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.jobs.poll_interval, Duration::from_millis(50));
}

#[test]
fn smtp_requires_a_sender() {
    let mut raw = RawSettings::default();
    raw.mail.smtp.host = Some("smtp.example.com".to_string());
    let err = Settings::from_raw(raw.clone()).expect_err("from is required");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "mail.smtp.from",
            ..
        }
    ));

    raw.mail.smtp.from = Some("Escritorio <docs@example.com>".to_string());
    raw.mail.smtp.tls = Some("wrapper".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    let smtp = settings.mail.smtp.expect("smtp configured");
    assert_eq!(smtp.port, 587);
    assert_eq!(smtp.tls, SmtpTls::Wrapper);
}

#[test]
fn invalid_values_name_their_key() {
    let mut raw = RawSettings::default();
    raw.jobs.ttl_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "jobs.ttl_seconds",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.naming.name_template = Some("{index".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "naming.name_template",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.mail.transport = Some("pigeon".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "mail.transport",
            ..
        })
    ));
}

#[test]
fn parse_generate_arguments() {
    let args = CliArgs::parse_from([
        "docbatch",
        "generate",
        "--template",
        "modelo.docx",
        "--data",
        "dados.csv",
        "--mapping",
        "mapa.toml",
        "--convert",
        "--email-column",
        "Email",
        "--log-level",
        "debug",
    ]);

    match args.command {
        Command::Generate(generate) => {
            assert_eq!(generate.job.template, PathBuf::from("modelo.docx"));
            assert_eq!(generate.job.out, PathBuf::from("out"));
            assert!(generate.convert);
            assert_eq!(generate.email_column.as_deref(), Some("Email"));
            assert_eq!(
                generate.job.overrides.logging.log_level.as_deref(),
                Some("debug")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_send_requires_email_column() {
    let parsed = CliArgs::try_parse_from([
        "docbatch",
        "send",
        "--template",
        "t.docx",
        "--data",
        "d.csv",
        "--mapping",
        "m.toml",
    ]);
    assert!(parsed.is_err());

    let args = CliArgs::parse_from([
        "docbatch",
        "send",
        "--template",
        "t.docx",
        "--data",
        "d.csv",
        "--mapping",
        "m.toml",
        "--email-column",
        "contato",
        "--mail-transport",
        "local_client",
    ]);
    let overrides = args.command.overrides().expect("send has run overrides");
    assert_eq!(overrides.mail_transport.as_deref(), Some("local_client"));
}

#[test]
fn placeholders_command_only_takes_logging_overrides() {
    let args = CliArgs::parse_from([
        "docbatch",
        "placeholders",
        "--template",
        "t.docx",
        "--log-json",
        "true",
    ]);
    assert!(args.command.overrides().is_none());
    assert_eq!(args.command.logging().log_json, Some(true));
}
