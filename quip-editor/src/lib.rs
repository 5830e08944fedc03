#![allow(non_snake_case)]

use std::rc::Rc;

use dioxus::prelude::*;
use log::{debug, warn};
use quip_core::config::Config;
use quip_core::preview::{preview_texts, PreviewText};
use quip_core::store::{NEW_TEXT, NEW_TEXT_Y_PERCENT};
use quip_core::{
    ContainerRect, DragController, EditorSession, ExportSnapshot, ImageSource, MemeError,
    PointerCapture, PointerPoint, TextLayer, FONT_FAMILIES, MAX_FONT_SIZE, MAX_STROKE_WIDTH, MIN_FONT_SIZE,
    MIN_STROKE_WIDTH,
};
use serde_json::{json, Value};

const MAIN_CSS: Asset = asset!("/assets/editor.css");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Download,
    Clipboard,
    Save,
}

/// Sent to the host, which renders and delivers the snapshot.
#[derive(Clone, Debug)]
pub struct ExportRequest {
    pub kind: ExportKind,
    pub snapshot: ExportSnapshot,
}

/// Renders the full-screen pointer catcher while a drag is in progress.
#[derive(Clone, Copy)]
struct CaptureLayer {
    active: Signal<bool>,
}

impl PointerCapture for CaptureLayer {
    fn attach(&mut self) {
        if let Ok(mut active) = self.active.try_write() {
            *active = true;
        }
    }

    // The signal may already be gone when the editor unmounts mid-drag.
    fn detach(&mut self) {
        if let Ok(mut active) = self.active.try_write() {
            *active = false;
        }
    }
}

/// How the `<img>` gets the session's image.
#[derive(Debug, Clone, PartialEq)]
enum ImageSrc {
    /// Loadable as-is.
    Direct(String),
    /// Bytes or pixels the page wraps in an object URL.
    Object(Value),
}

fn image_src(source: &ImageSource) -> ImageSrc {
    if let Some(url) = source.preview_url() {
        return ImageSrc::Direct(url.to_string());
    }
    match source {
        ImageSource::Blob { data } => ImageSrc::Object(json!({ "kind": "bytes", "data": &**data })),
        ImageSource::DecodedBitmap(bitmap) => ImageSrc::Object(json!({
            "kind": "rgba",
            "width": bitmap.width(),
            "height": bitmap.height(),
            "pixels": bitmap.pixels(),
        })),
        ImageSource::RemoteUrl { url } => ImageSrc::Direct(url.clone()),
    }
}

const CREATE_OBJECT_URL_JS: &str = r#"
const image = await dioxus.recv();
let blob;
if (image.kind === "rgba") {
    const canvas = document.createElement("canvas");
    canvas.width = image.width;
    canvas.height = image.height;
    const pixels = new ImageData(new Uint8ClampedArray(image.pixels), image.width, image.height);
    canvas.getContext("2d").putImageData(pixels, 0, 0);
    blob = await new Promise((resolve) => canvas.toBlob(resolve, "image/png"));
} else {
    blob = new Blob([new Uint8Array(image.data)]);
}
return URL.createObjectURL(blob);
"#;

async fn create_object_url(payload: Value) -> Option<String> {
    let eval = document::eval(CREATE_OBJECT_URL_JS);
    if let Err(e) = eval.send(payload) {
        warn!("Could not hand image to the page: {:?}", e);
        return None;
    }
    match eval.join::<String>().await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Could not create object URL: {:?}", e);
            None
        }
    }
}

fn revoke_object_url(url: String) {
    debug!("Revoking {}", url);
    let eval = document::eval("URL.revokeObjectURL(await dioxus.recv());");
    let _ = eval.send(url);
}

/// Logs a refused edit and returns the message shown in the editor.
fn reject(action: &str, what: &str, err: &MemeError) -> String {
    warn!("Rejected {}: {}", what, err);
    err.user_message(action)
}

fn client_point(evt: &PointerEvent) -> PointerPoint {
    let coords = evt.client_coordinates();
    PointerPoint {
        x: coords.x as f32,
        y: coords.y as f32,
    }
}

#[component]
pub fn MemeEditor(
    session: Signal<EditorSession>,
    config: Config,
    #[props(!optional)] notice: Option<String>,
    on_export: EventHandler<ExportRequest>,
) -> Element {
    let capturing = use_signal(|| false);
    let mut drag = use_signal(move || DragController::new(CaptureLayer { active: capturing }));
    let mut container = use_signal(|| None::<Rc<MountedData>>);
    let mut bounds = use_signal(ContainerRect::default);
    let mut message = use_signal(|| None::<String>);

    // The <img> shows exactly the source exports render from.
    let image = use_memo(move || session.read().image().cloned());
    let mut pending_object_url = use_signal(|| None::<String>);
    let api = config.clone();
    let image_url = use_resource(move || {
        let api = api.clone();
        async move {
            let (url, created) = match image().map(|source| image_src(&source)) {
                Some(ImageSrc::Direct(url)) => (Some(api.image_url(&url)), None),
                Some(ImageSrc::Object(payload)) => {
                    let created = create_object_url(payload).await;
                    (created.clone(), created)
                }
                None => (None, None),
            };
            // Only the newest object URL is kept, until its image has loaded.
            let replaced = std::mem::replace(&mut *pending_object_url.write(), created);
            if let Some(old) = replaced {
                revoke_object_url(old);
            }
            url
        }
    });
    let mut release_object_url = move || {
        let loaded = pending_object_url.write().take();
        if let Some(url) = loaded {
            revoke_object_url(url);
        }
    };

    use_drop(move || {
        if let Ok(mut session) = session.try_write() {
            session.teardown();
        }
    });

    let mut apply = move |field: &'static str, value: Value| {
        let mut session = session.write();
        let index = session.store().active_index();
        match session.store_mut().apply_field(index, field, &value) {
            Ok(()) => message.set(None),
            Err(err) => {
                let what = format!("{} edit on text {}", field, index + 1);
                message.set(Some(reject("update text", &what, &err)));
            }
        }
    };

    let (title, save_label, has_image, (width, height)) = {
        let session = session.read();
        (
            session.title(),
            session.save_label(),
            session.has_image(),
            session.canvas_size(&config),
        )
    };

    let mut request_export = move |kind: ExportKind| {
        let snapshot = session.read().export_snapshot(width, height);
        if let Some(snapshot) = snapshot {
            on_export.call(ExportRequest { kind, snapshot });
        }
    };

    let image_url = image_url.read().clone().flatten();
    let texts = {
        let session = session.read();
        preview_texts(session.layers(), session.store().active_index(), width as f32, height as f32)
    };
    let active_layer: Option<TextLayer> = session.read().store().active_layer().cloned();
    let cursor_style = if capturing() { "grabbing" } else { "default" };
    let view_box = format!("0 0 {} {}", width, height);

    rsx! {
        document::Stylesheet { href: MAIN_CSS }
        div {
            class: "meme-editor",
            style: "cursor: {cursor_style};",

            h2 { "{title}" }

            div {
                class: "meme-container",
                style: "width: {width}px; height: {height}px;",
                onmounted: move |evt| container.set(Some(evt.data())),

                if let Some(url) = image_url {
                    img {
                        class: "meme-image",
                        src: "{url}",
                        alt: "Meme",
                        draggable: "false",
                        onload: move |_| release_object_url(),
                        onerror: move |_| release_object_url(),
                    }
                } else {
                    div { class: "meme-placeholder", "Choose a template or upload an image" }
                }

                svg {
                    class: "meme-overlay",
                    "viewBox": "{view_box}",
                    for (index, item) in texts.into_iter().enumerate() {
                        OverlayText {
                            key: "{item.id}",
                            item,
                            on_grab: move |evt: PointerEvent| async move {
                                let pointer = client_point(&evt);
                                let element = container.read().clone();
                                let rect = match element {
                                    Some(element) => element.get_client_rect().await.ok(),
                                    None => None,
                                };
                                let rect = rect
                                    .map(|r| ContainerRect::new(
                                        r.origin.x as f32,
                                        r.origin.y as f32,
                                        r.size.width as f32,
                                        r.size.height as f32,
                                    ))
                                    .unwrap_or_default();
                                bounds.set(rect);
                                drag.write().on_pointer_down(pointer, index, rect, session.write().store_mut());
                            }
                        }
                    }
                }
            }

            if capturing() {
                div {
                    class: "drag-capture",
                    onpointermove: move |evt| {
                        let rect = bounds();
                        drag.write().on_pointer_move(client_point(&evt), rect, session.write().store_mut());
                    },
                    onpointerup: move |_| drag.write().on_pointer_up(),
                    onpointercancel: move |_| drag.write().on_pointer_up(),
                }
            }

            if let Some(text) = message() {
                div { class: "editor-message error", "{text}" }
            } else if let Some(text) = notice.as_ref() {
                div { class: "editor-message", "{text}" }
            }

            div {
                class: "layer-actions",
                for (index, layer) in session.read().layers().iter().enumerate() {
                    button {
                        key: "{layer.id}",
                        class: if index == session.read().store().active_index() { "layer-tab selected" } else { "layer-tab" },
                        onclick: move |_| session.write().store_mut().set_active(index),
                        "Text {index + 1}"
                    }
                }
                button {
                    class: "action-btn",
                    onclick: move |_| {
                        session.write().store_mut().add_layer(NEW_TEXT, NEW_TEXT_Y_PERCENT);
                        message.set(None);
                    },
                    "Add Text"
                }
                button {
                    class: "action-btn danger",
                    onclick: move |_| {
                        let mut session = session.write();
                        let index = session.store().active_index();
                        match session.store_mut().remove_layer(index) {
                            Ok(_) => message.set(None),
                            Err(err) => {
                                let what = format!("removal of text {}", index + 1);
                                message.set(Some(reject("remove text", &what, &err)));
                            }
                        }
                    },
                    "Remove Text"
                }
            }

            if let Some(layer) = active_layer {
                div {
                    class: "inspector-panel",
                    div {
                        class: "control-group",
                        label { "Text" }
                        input {
                            r#type: "text",
                            value: "{layer.content}",
                            oninput: move |evt| apply("content", Value::String(evt.value())),
                        }
                    }
                    div {
                        class: "control-group",
                        label { "Font" }
                        select {
                            value: "{layer.style.font_family}",
                            oninput: move |evt| apply("fontFamily", Value::String(evt.value())),
                            for family in FONT_FAMILIES {
                                option { value: "{family}", style: "font-family: {family};", "{family}" }
                            }
                        }
                    }
                    div {
                        class: "control-group",
                        label { "Size: {layer.style.font_size}px" }
                        input {
                            r#type: "range",
                            min: "{MIN_FONT_SIZE}",
                            max: "{MAX_FONT_SIZE}",
                            value: "{layer.style.font_size}",
                            oninput: move |evt| apply("fontSize", Value::String(evt.value())),
                        }
                    }
                    div {
                        class: "control-group",
                        label { "Color" }
                        input {
                            r#type: "color",
                            value: "{layer.style.color}",
                            oninput: move |evt| apply("color", Value::String(evt.value())),
                        }
                    }
                    div {
                        class: "control-group",
                        label { "Outline" }
                        input {
                            r#type: "color",
                            value: "{layer.style.stroke_color}",
                            oninput: move |evt| apply("strokeColor", Value::String(evt.value())),
                        }
                    }
                    div {
                        class: "control-group",
                        label { "Outline width: {layer.style.stroke_width}px" }
                        input {
                            r#type: "range",
                            min: "{MIN_STROKE_WIDTH}",
                            max: "{MAX_STROKE_WIDTH}",
                            value: "{layer.style.stroke_width}",
                            oninput: move |evt| apply("strokeWidth", Value::String(evt.value())),
                        }
                    }
                    div {
                        class: "control-group",
                        label { "Align" }
                        select {
                            value: "{layer.style.align.as_str()}",
                            oninput: move |evt| apply("align", Value::String(evt.value())),
                            option { value: "left", "Left" }
                            option { value: "center", "Center" }
                            option { value: "right", "Right" }
                        }
                    }
                }
            }

            div {
                class: "header-actions",
                button {
                    class: "primary-btn",
                    disabled: !has_image,
                    onclick: move |_| request_export(ExportKind::Download),
                    "Download"
                }
                button {
                    class: "primary-btn",
                    disabled: !has_image,
                    onclick: move |_| request_export(ExportKind::Clipboard),
                    "Copy"
                }
                button {
                    class: "primary-btn",
                    disabled: !has_image,
                    onclick: move |_| request_export(ExportKind::Save),
                    "{save_label}"
                }
            }
        }
    }
}

#[component]
fn OverlayText(item: PreviewText, on_grab: EventHandler<PointerEvent>) -> Element {
    let class_name = if item.active { "meme-text selected" } else { "meme-text" };

    rsx! {
        text {
            class: "{class_name}",
            "x": "{item.x}",
            "y": "{item.y}",
            "text-anchor": "{item.text_anchor}",
            "font-family": "{item.font_family}",
            "font-size": "{item.font_size}",
            "fill": "{item.fill}",
            "stroke": "{item.stroke}",
            "stroke-width": "{item.stroke_width}",
            "stroke-linejoin": "miter",
            "paint-order": "stroke",
            onpointerdown: move |evt| {
                evt.prevent_default();
                evt.stop_propagation();
                on_grab.call(evt);
            },
            "{item.content}"
        }
    }
}
