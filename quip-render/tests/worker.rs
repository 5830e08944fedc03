use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cosmic_text::FontSystem;
use image::{ImageFormat, Rgba, RgbaImage};
use quip_core::config::Config;
use quip_core::{DeliveryError, EditorSession, ImageSource, MemeError};
use quip_render::{ClipboardSink, Compositor, ExportAction, Exporter, Notice, RenderWorker};

#[derive(Clone, Default)]
struct SharedClipboard {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ClipboardSink for SharedClipboard {
    fn write_png(&mut self, png: &[u8]) -> Result<(), DeliveryError> {
        self.written.lock().unwrap().push(png.to_vec());
        Ok(())
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([40, 80, 120, 255]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
    out
}

fn spawn_worker(clipboard: SharedClipboard) -> RenderWorker {
    let config = Config::default();
    RenderWorker::spawn(move || {
        let compositor = Compositor::with_font_system(FontSystem::new_with_locale_and_db(
            "en-US".into(),
            cosmic_text::fontdb::Database::new(),
        ));
        Exporter::new(&config, compositor, clipboard)
    })
    .unwrap()
}

#[tokio::test]
async fn worker_decodes_uploads_and_runs_exports() {
    let clipboard = SharedClipboard::default();
    let written = clipboard.written.clone();
    let worker = spawn_worker(clipboard);

    let bitmap = worker.load(ImageSource::blob(png_bytes(4, 3))).await.unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (4, 3));

    let session = EditorSession::for_upload(ImageSource::DecodedBitmap(bitmap));
    let notice = worker
        .run(session.export_snapshot(20, 20), ExportAction::Clipboard)
        .await;
    assert_eq!(notice, Some(Notice::Success("Meme copied to clipboard!".into())));

    let written = written.lock().unwrap();
    assert_eq!(written.len(), 1);
    let copied = image::load_from_memory(&written[0]).unwrap();
    assert_eq!((copied.width(), copied.height()), (20, 20));
}

#[tokio::test]
async fn worker_reports_rejected_uploads() {
    let worker = spawn_worker(SharedClipboard::default());

    let err = worker
        .load(ImageSource::blob(b"%PDF-1.7".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, MemeError::Validation(_)));

    // the worker keeps serving after a failed job
    let notice = worker.run(None, ExportAction::Download).await;
    assert_eq!(notice, None);
}

#[test]
fn startup_failure_is_returned() {
    let result = RenderWorker::spawn(|| {
        Err::<Exporter<SharedClipboard>, _>(MemeError::validation("no exporter"))
    });
    match result {
        Err(MemeError::Validation(message)) => assert_eq!(message, "no exporter"),
        other => panic!("unexpected startup result: {:?}", other.map(|_| ())),
    }
}
