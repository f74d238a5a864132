//! Periodic export progress reports.

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

use crate::export::{ExportHandle, ExportStatus};

type ReportFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Samples an export's status on a timer thread and logs a line per tick.
pub struct ExportProgressReporter {
    export: ExportHandle,
    interval: Duration,
    on_report: Option<ReportFn>,
    worker: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl ExportProgressReporter {
    pub fn new(export: ExportHandle, interval: Duration) -> Self {
        Self {
            export,
            interval,
            on_report: None,
            worker: Mutex::new(None),
        }
    }

    /// Also pass every report line to `f`.
    pub fn with_callback(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_report = Some(Arc::new(f));
        self
    }

    /// Current report line.
    pub fn report(&self) -> String {
        describe(self.export.status(), self.export.progress().fraction())
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Start reporting. Does nothing if already started.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let export = self.export.clone();
        let interval = self.interval;
        let on_report = self.on_report.clone();
        let spawned = std::thread::Builder::new()
            .name("vidoverlay-progress".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let line = describe(export.status(), export.progress().fraction());
                        info!(session = %export.id(), "{line}");
                        if let Some(f) = &on_report {
                            f(&line);
                        }
                    }
                    _ => break,
                }
            });

        match spawned {
            Ok(handle) => *worker = Some((stop_tx, handle)),
            Err(e) => warn!(error = %e, "failed to start progress reporter"),
        }
    }

    /// Stop reporting and wait for the timer thread. Does nothing if not
    /// running.
    pub fn stop(&self) {
        let Some((stop_tx, handle)) = self.worker.lock().take() else {
            return;
        };
        drop(stop_tx);
        if handle.join().is_err() {
            warn!("progress reporter thread panicked");
        }
    }
}

impl Drop for ExportProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Report line for a status and completion fraction.
pub fn describe(status: ExportStatus, fraction: f64) -> String {
    match status {
        ExportStatus::Waiting => "pending".to_string(),
        ExportStatus::Exporting => format!("exporting: {:.1}%", fraction * 100.0),
        ExportStatus::Completed => "done".to_string(),
        ExportStatus::Cancelled => "canceled".to_string(),
        ExportStatus::Failed => "failed!".to_string(),
        ExportStatus::Unknown => "unknown error".to_string(),
    }
}
