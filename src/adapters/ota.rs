//! Firmware update runner.
//!
//! Implements [`UpdatePort`].  Each admitted update runs on its own
//! thread: download the image over HTTPS, stream it into the inactive
//! OTA partition with `esp-ota`, mark it bootable.  The thread signals
//! the guard through its [`UpdateCompletion`] and then queues
//! [`Event::UpdateFinished`] so the dispatch loop can act on the outcome
//! (restart into the new image, or restart after a failure).
//!
//! Cancellation is cooperative: [`UpdatePort::terminate`] raises a flag
//! the download loop checks between chunks.  Dropping the partial
//! `OtaUpdate` aborts it.  The guard keeps refusing new runs until the
//! cancelled thread has signalled its token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::app::ports::{TaskHandle, TaskState, UpdatePort};
use crate::drivers::task_pin::{self, Core};
use crate::error::UpdateError;
use crate::events::{Event, EventQueue, push_event};
use crate::update::{UpdateCompletion, UpdateContext, UpdateOutcome};

/// Update task stack (KB).  TLS handshakes need the headroom.
const UPDATE_STACK_KB: usize = 8;
const UPDATE_PRIORITY: u8 = 5;

/// Per-run flags shared between the runner and the task thread.
#[derive(Debug, Default)]
pub struct RunFlags {
    cancel: AtomicBool,
    done: AtomicBool,
}

impl RunFlags {
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// The body of an update task.
pub type FlashFn = fn(&UpdateContext, &RunFlags) -> UpdateOutcome;

pub struct OtaUpdater {
    queue: &'static EventQueue,
    flash: FlashFn,
    next_handle: u32,
    runs: Vec<(TaskHandle, Arc<RunFlags>)>,
}

impl OtaUpdater {
    /// Runner that flashes real images (simulated on host targets).
    pub fn firmware(queue: &'static EventQueue) -> Self {
        Self::new(queue, download_and_flash)
    }

    pub fn new(queue: &'static EventQueue, flash: FlashFn) -> Self {
        Self {
            queue,
            flash,
            next_handle: 0,
            runs: Vec::new(),
        }
    }

    fn flags(&self, handle: TaskHandle) -> Option<&Arc<RunFlags>> {
        self.runs.iter().find(|(h, _)| *h == handle).map(|(_, f)| f)
    }
}

impl UpdatePort for OtaUpdater {
    fn spawn_update_task(
        &mut self,
        context: UpdateContext,
        completion: UpdateCompletion,
    ) -> Result<TaskHandle, UpdateError> {
        self.runs.retain(|(_, f)| !f.done.load(Ordering::Acquire));
        self.next_handle = self.next_handle.wrapping_add(1);
        let handle = TaskHandle(self.next_handle);
        let flags = Arc::new(RunFlags::default());

        let task_flags = Arc::clone(&flags);
        let queue = self.queue;
        let flash = self.flash;
        task_pin::spawn_on_core(
            Core::App,
            UPDATE_PRIORITY,
            UPDATE_STACK_KB,
            "ota_task\0",
            move || {
                info!("OTA[{}]: run {} started", handle, completion.generation());
                let outcome = flash(&context, &task_flags);
                task_flags.done.store(true, Ordering::Release);
                if !completion.complete(outcome) {
                    info!("OTA[{}]: run superseded, outcome {} ignored", handle, outcome);
                }
                if !push_event(queue, Event::UpdateFinished { handle, outcome }) {
                    warn!("OTA[{}]: event queue full, outcome left for the next tick", handle);
                }
            },
        )
        .map_err(|e| {
            warn!("OTA: task spawn failed: {}", e);
            UpdateError::SpawnFailed
        })?;

        self.runs.push((handle, flags));
        Ok(handle)
    }

    fn state_of(&self, handle: TaskHandle) -> TaskState {
        match self.flags(handle) {
            Some(f) if f.done.load(Ordering::Acquire) => TaskState::Completed,
            Some(_) => TaskState::Running,
            None => TaskState::Unknown,
        }
    }

    fn terminate(&mut self, handle: TaskHandle) {
        if let Some(flags) = self.flags(handle) {
            flags.cancel.store(true, Ordering::Release);
            info!("OTA[{}]: cancel requested", handle);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Download + flash
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn download_and_flash(context: &UpdateContext, flags: &RunFlags) -> UpdateOutcome {
    use embedded_svc::http::client::Client;
    use embedded_svc::io::Read;
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

    const CHUNK: usize = 4096;
    const PROGRESS_EVERY: usize = 64 * 1024;

    info!(
        "OTA: downloading {} (deadline {}s)",
        context.firmware_url, context.timeout_secs
    );

    let connection = match EspHttpConnection::new(&Configuration {
        buffer_size: Some(CHUNK),
        buffer_size_tx: Some(512),
        timeout: Some(core::time::Duration::from_secs(30)),
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    }) {
        Ok(c) => c,
        Err(e) => {
            warn!("OTA: HTTP client init failed: {}", e);
            return UpdateOutcome::Failed(UpdateError::DownloadFailed(0));
        }
    };
    let mut client = Client::wrap(connection);

    let mut response = match client.get(&context.firmware_url).and_then(|r| r.submit()) {
        Ok(r) => r,
        Err(e) => {
            warn!("OTA: request failed: {:?}", e);
            return UpdateOutcome::Failed(UpdateError::DownloadFailed(0));
        }
    };
    let status = response.status();
    if status != 200 {
        warn!("OTA: server answered {}", status);
        return UpdateOutcome::Failed(UpdateError::DownloadFailed(status));
    }

    let mut update = match esp_ota::OtaUpdate::begin() {
        Ok(u) => u,
        Err(e) => {
            warn!("OTA: begin failed: {:?}", e);
            return UpdateOutcome::Failed(UpdateError::WriteFailed);
        }
    };

    let mut buf = [0u8; CHUNK];
    let mut written = 0usize;
    loop {
        if flags.cancelled() {
            warn!("OTA: cancelled after {} bytes", written);
            return UpdateOutcome::Cancelled;
        }
        let n = match response.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("OTA: read failed after {} bytes: {:?}", written, e);
                return UpdateOutcome::Failed(UpdateError::DownloadFailed(status));
            }
        };
        if let Err(e) = update.write(&buf[..n]) {
            warn!("OTA: write failed at {} bytes: {:?}", written, e);
            return UpdateOutcome::Failed(UpdateError::WriteFailed);
        }
        if (written + n) / PROGRESS_EVERY != written / PROGRESS_EVERY {
            info!("OTA: {} KB written", (written + n) / 1024);
        }
        written += n;
    }

    let mut completed = match update.finalize() {
        Ok(c) => c,
        Err(e) => {
            warn!("OTA: image verification failed: {:?}", e);
            return UpdateOutcome::Failed(UpdateError::VerifyFailed);
        }
    };
    if let Err(e) = completed.set_as_boot_partition() {
        warn!("OTA: set boot partition failed: {:?}", e);
        return UpdateOutcome::Failed(UpdateError::VerifyFailed);
    }

    info!("OTA: {} bytes flashed, new image is bootable", written);
    UpdateOutcome::Succeeded
}

/// Simulation: pretend to download for a moment, honouring cancellation.
#[cfg(not(target_os = "espidf"))]
fn download_and_flash(context: &UpdateContext, flags: &RunFlags) -> UpdateOutcome {
    info!("OTA(sim): downloading {}", context.firmware_url);
    for _ in 0..10 {
        if flags.cancelled() {
            return UpdateOutcome::Cancelled;
        }
        std::thread::sleep(core::time::Duration::from_millis(10));
    }
    info!("OTA(sim): image accepted");
    UpdateOutcome::Succeeded
}
