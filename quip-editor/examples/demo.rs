//! Desktop host for the editor.
//!
//! `cargo run -p quip-editor --example demo --features desktop [image]`
//!
//! With an image path the file is opened as an upload, otherwise a template
//! is used. Saving reads the bearer token from `QUIP_TOKEN`.

use dioxus::prelude::*;
use quip_core::config::{self, Config};
use quip_core::preview::render_to_rsx;
use quip_core::{EditorSession, ExportSnapshot, ImageSource, Template};
use quip_editor::{ExportKind, ExportRequest, MemeEditor};
use quip_render::{Compositor, ExportAction, Exporter, Notice, RenderWorker, SystemClipboard};

fn main() {
    env_logger::init();
    dioxus::LaunchBuilder::desktop().launch(App);
}

fn initial_session() -> EditorSession {
    if let Some(path) = std::env::args().nth(1) {
        match std::fs::read(&path) {
            Ok(bytes) => return EditorSession::for_upload(ImageSource::blob(bytes)),
            Err(e) => log::warn!("Could not read {}: {}", path, e),
        }
    }

    EditorSession::for_template(Template {
        id: "demo".to_string(),
        name: "Puppy".to_string(),
        image_url: "https://picsum.photos/id/237/500/500".to_string(),
        width: 500,
        height: 500,
    })
}

fn start_worker(config: Config) -> Result<RenderWorker, String> {
    RenderWorker::spawn(move || {
        let mut compositor = Compositor::new();
        compositor.load_font_dirs(&config.font_dirs);
        Exporter::new(&config, compositor, SystemClipboard::new())
    })
    .map_err(|e| e.user_message("start the renderer"))
}

fn App() -> Element {
    let config = use_hook(|| config::load().unwrap_or_default());
    let worker = use_hook({
        let config = config.clone();
        move || start_worker(config)
    });
    let mut session = use_signal(initial_session);
    let mut notice = use_signal(|| None::<String>);
    let mut last_export = use_signal(|| None::<ExportSnapshot>);

    let loader = worker.clone();
    use_hook(move || {
        spawn(async move {
            let Ok(worker) = loader else { return };
            let Some(source) = session.peek().initial_source() else { return };
            let ticket = session.write().begin_image_load(source.clone());
            let result = worker.load(source).await;
            if let Err(err) = session.write().finish_image_load(ticket, result) {
                notice.set(Some(err.user_message("load image")));
            }
        });
    });

    let exporter = worker.clone();
    let startup_error = worker.err();
    let preview_config = config.clone();

    rsx! {
        style {
            "{{
                body, html {{
                    margin: 0;
                    padding: 0;
                    height: 100%;
                    width: 100%;
                }}
            }}"
        }
        if let Some(error) = startup_error {
            div { class: "editor-message error", "{error}" }
        }
        MemeEditor {
            session,
            config: config.clone(),
            notice: notice(),
            on_export: move |request: ExportRequest| {
                let Ok(worker) = exporter.clone() else { return };
                let action = match request.kind {
                    ExportKind::Download => ExportAction::Download,
                    ExportKind::Clipboard => ExportAction::Clipboard,
                    ExportKind::Save => ExportAction::Save {
                        token: std::env::var("QUIP_TOKEN").ok(),
                    },
                };
                last_export.set(Some(request.snapshot.clone()));
                spawn(async move {
                    let outcome = worker.run(Some(request.snapshot), action).await;
                    notice.set(outcome.map(|notice| match notice {
                        Notice::Success(message) | Notice::Error(message) => message,
                    }));
                });
            },
        }
        if let Some(snapshot) = last_export() {
            h3 { "Last export" }
            {
                let url = snapshot.image.preview_url().map(|url| preview_config.image_url(url));
                render_to_rsx(url.as_deref(), &snapshot.layers, snapshot.width / 2, snapshot.height / 2)
            }
        }
    }
}
