/*
    Quip - meme compositor and text-layer editor
    Copyright (C) 2025 meetzli

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.
*/

//! A dedicated thread owning an [`Exporter`] and a current-thread runtime.
//!
//! UI hosts that do not drive a tokio runtime hand image loads and export
//! actions to a [`RenderWorker`] and await the replies from their own
//! executor. Jobs run one at a time in submission order.

use std::sync::mpsc as std_mpsc;
use std::thread;

use log::{debug, warn};
use quip_core::{Bitmap, DeliveryError, ExportSnapshot, ImageSource, MemeError, Result};
use tokio::sync::{mpsc, oneshot};

use crate::clipboard::ClipboardSink;
use crate::export::{ExportAction, Exporter, Notice};
use crate::resolve::Purpose;

enum Job {
    Load {
        source: ImageSource,
        reply: oneshot::Sender<Result<Bitmap>>,
    },
    Export {
        snapshot: Option<ExportSnapshot>,
        action: ExportAction,
        reply: oneshot::Sender<Option<Notice>>,
    },
}

/// Handle to the worker thread. Clones share the same thread, which stops
/// once every handle is dropped.
#[derive(Clone, Debug)]
pub struct RenderWorker {
    jobs: mpsc::UnboundedSender<Job>,
}

fn worker_stopped() -> MemeError {
    DeliveryError::Io("render worker stopped".into()).into()
}

impl RenderWorker {
    /// Starts the thread and builds the exporter on it. Returns once the
    /// exporter exists, or with the error that prevented it.
    pub fn spawn<C, F>(make_exporter: F) -> Result<Self>
    where
        C: ClipboardSink + 'static,
        F: FnOnce() -> Result<Exporter<C>> + Send + 'static,
    {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();

        thread::Builder::new()
            .name("quip-render".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(DeliveryError::Io(e.to_string()).into()));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let mut exporter = match make_exporter() {
                        Ok(exporter) => exporter,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));

                    while let Some(job) = queue.recv().await {
                        match job {
                            Job::Load { source, reply } => {
                                let result =
                                    exporter.resolver().resolve(&source, Purpose::Preview).await;
                                let _ = reply.send(result);
                            }
                            Job::Export {
                                snapshot,
                                action,
                                reply,
                            } => {
                                let notice = exporter.run(snapshot.as_ref(), &action).await;
                                let _ = reply.send(notice);
                            }
                        }
                    }
                    debug!("Render worker stopped");
                });
            })
            .map_err(|e| DeliveryError::Io(e.to_string()))?;

        match ready_rx.recv() {
            Ok(result) => result?,
            Err(_) => return Err(worker_stopped()),
        }
        Ok(Self { jobs })
    }

    /// Decodes `source` for the live preview.
    pub async fn load(&self, source: ImageSource) -> Result<Bitmap> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job::Load { source, reply })
            .map_err(|_| worker_stopped())?;
        response.await.map_err(|_| worker_stopped())?
    }

    /// [`Exporter::run`] on the worker thread.
    pub async fn run(&self, snapshot: Option<ExportSnapshot>, action: ExportAction) -> Option<Notice> {
        let verb = action.verb();
        let (reply, response) = oneshot::channel();
        let sent = self.jobs.send(Job::Export {
            snapshot,
            action,
            reply,
        });

        let received = match sent {
            Ok(()) => response.await.ok(),
            Err(_) => None,
        };
        received.unwrap_or_else(|| {
            warn!("Export dropped: render worker stopped");
            Some(Notice::Error(worker_stopped().user_message(verb)))
        })
    }
}
