mod helpers;

use axum::http::StatusCode;
use helpers::{MockBuilder, RecordingView, Reply, ViewEvent};
use medicai_pipeline::{
    NormalizedPayload, PageOutcome, PayloadSource, Pipeline, PipelineConfig, ResourceKind,
    SelectedFile, SessionId, Theme, Url,
};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

async fn open(dir: &TempDir, base_url: &str) -> anyhow::Result<Pipeline> {
    let config = PipelineConfig::default()
        .with_base_url(base_url)
        .with_storage_path(dir.path().join("state").join("storage.json"));
    Ok(Pipeline::open(config).await?)
}

#[tokio::test]
async fn session_and_results_survive_restart() -> anyhow::Result<()> {
    let session = Uuid::new_v4().to_string();
    let backend = MockBuilder::default()
        .upload(Reply::json(
            StatusCode::OK,
            json!({ "status": "success", "session_id": session }),
        ))
        .diagnosis(Reply::json(
            StatusCode::OK,
            json!({ "status": "success", "diagnosis": [{ "diagnosis": "Migraine", "confidence_level": "moderate" }] }),
        ))
        .start()
        .await;
    let dir = tempfile::tempdir()?;

    {
        let pipeline = open(&dir, &backend.base_url()).await?;
        let uploader = pipeline.uploader();
        uploader.select(vec![SelectedFile::new("mri.png", "image/png", vec![0u8; 512])]);
        let outcome = uploader.submit(None).await?;
        assert_eq!(outcome.session_id.as_str(), session);
        pipeline.set_theme(Theme::Dark).await?;
    }

    let pipeline = open(&dir, &backend.base_url()).await?;
    assert_eq!(pipeline.theme().await, Some(Theme::Dark));

    let location = Url::parse("http://localhost/diagnosis.html")?;
    let mut view = RecordingView::default();
    let outcome = pipeline
        .result_page(ResourceKind::Diagnosis)
        .load(&location, &mut [], &mut view)
        .await;
    assert_eq!(
        outcome,
        PageOutcome::Rendered {
            session_id: SessionId::parse(&session).unwrap(),
            source: PayloadSource::Network,
        }
    );
    assert_eq!(
        backend.recorded.session_ids.lock().unwrap().as_slice(),
        [session.clone()]
    );

    let ViewEvent::Rendered(NormalizedPayload::Diagnosis(entries)) = &view.events[1] else {
        panic!("expected diagnoses, got {:?}", view.events);
    };
    assert_eq!(entries[0].name, "Migraine");
    assert_eq!(entries[0].confidence_label, "moderate");

    // Reopen once more: the cached payload is served from disk.
    let reopened = open(&dir, &backend.base_url()).await?;
    let mut cached = RecordingView::default();
    let outcome = reopened
        .result_page(ResourceKind::Diagnosis)
        .load(&location, &mut [], &mut cached)
        .await;
    assert!(matches!(
        outcome,
        PageOutcome::Rendered {
            source: PayloadSource::Cache,
            ..
        }
    ));
    assert_eq!(backend.recorded.request_count(), 2);
    Ok(())
}
