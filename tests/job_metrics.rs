mod support;

use std::{collections::HashSet, sync::Arc, time::Duration};

use docbatch::{
    application::{
        convert::Converter,
        jobs::{JobOptions, JobRegistry, RegistrySettings},
    },
    domain::types::{JobKind, JobStatus},
};
use metrics_util::debugging::DebuggingRecorder;

use support::{FakeConverter, RecordingMailer, dataset, mapping, request, services, wait_terminal};

#[tokio::test]
async fn job_pipeline_emits_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let converters: Vec<Arc<dyn Converter>> = vec![
        FakeConverter::failing("office", "not installed"),
        FakeConverter::pdf("fallback"),
    ];
    let mailer = RecordingMailer::rejecting(&["bia@example.com"]);
    let registry = JobRegistry::in_memory(
        services(converters, mailer),
        RegistrySettings {
            ttl: Duration::from_millis(1),
            sweep_interval: Duration::from_secs(60),
        },
    );

    let data = dataset(
        &["Nome", "Escola", "Email"],
        &[
            &["Ana", "EE Sol", "ana@example.com"],
            &["Bia", "EE Lua", "bia@example.com"],
        ],
    );
    let created = registry
        .create(request(
            JobKind::Send,
            data,
            mapping(&[("nome", "Nome"), ("escola", "Escola")]),
            JobOptions {
                email_column: Some("Email".to_string()),
                ..JobOptions::default()
            },
        ))
        .expect("job created");
    let view = wait_terminal(&registry, created.job_id).await;
    assert_eq!(view.status, JobStatus::Done);

    // A chain where every backend fails feeds the failure counter.
    let broken: Vec<Arc<dyn Converter>> = vec![FakeConverter::failing("office", "crashed")];
    let failing = JobRegistry::in_memory(
        services(broken, RecordingMailer::new()),
        RegistrySettings::default(),
    );
    let created_failing = failing
        .create(request(
            JobKind::Generate,
            dataset(&["Nome", "Escola"], &[&["Caio", "EE Mar"]]),
            mapping(&[("nome", "Nome")]),
            JobOptions {
                convert: true,
                ..JobOptions::default()
            },
        ))
        .expect("job created");
    wait_terminal(&failing, created_failing.job_id).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(registry.sweep(), 1);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "docbatch_rows_processed_total",
        "docbatch_conversion_ms",
        "docbatch_conversion_failures_total",
        "docbatch_emails_sent_total",
        "docbatch_emails_failed_total",
        "docbatch_jobs_evicted_total",
        "docbatch_jobs_active",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
