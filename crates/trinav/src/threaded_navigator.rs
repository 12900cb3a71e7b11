//! Navigator driven by a dedicated background thread

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use trinav_common::Result;
use web_time::Instant;

use crate::config::ThreadedNavigatorConfig;
use crate::navigator::{MasterNavigator, Navigator};
use crate::tri_nav_mesh::TriNavMesh;

/// Runs a [`MasterNavigator`] on its own thread.
///
/// Each frame processes pending work within the navigator's timeslice, runs
/// maintenance when it is due and sleeps for the rest of the frame. Dropping
/// the value disposes the navigator and joins the thread.
#[derive(Debug)]
pub struct ThreadedNavigator {
    navigator: Navigator,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedNavigator {
    /// Starts the processing thread.
    pub fn start(mesh: Arc<TriNavMesh>, config: ThreadedNavigatorConfig) -> Result<Self> {
        config.validate()?;
        let master = MasterNavigator::new(mesh, config.navigator.clone())?;
        let navigator = master.navigator();
        let (frame_length, maintenance_frequency) =
            (config.frame_length, config.maintenance_frequency);

        let worker = thread::Builder::new()
            .name("trinav-navigator".to_string())
            .spawn(move || run(master, config))?;

        log::info!(
            "Started navigator thread: frame {frame_length:?}, maintenance every {maintenance_frequency:?}"
        );
        Ok(Self {
            navigator,
            worker: Some(worker),
        })
    }

    /// Client handle for submitting requests.
    pub fn navigator(&self) -> Navigator {
        self.navigator.clone()
    }

    /// Signals the thread to dispose the navigator and exit. Idempotent.
    pub fn dispose(&self) {
        self.navigator.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.navigator.is_disposed()
    }
}

impl Drop for ThreadedNavigator {
    fn drop(&mut self) {
        self.dispose();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Navigator thread panicked");
            }
        }
    }
}

fn run(mut master: MasterNavigator, config: ThreadedNavigatorConfig) {
    let mut last_maintenance = Instant::now();
    while !master.is_disposed() {
        let frame_start = Instant::now();
        let run_maintenance =
            frame_start.saturating_duration_since(last_maintenance) >= config.maintenance_frequency;
        if run_maintenance {
            last_maintenance = frame_start;
        }
        if !master.process(run_maintenance) {
            break;
        }
        if let Some(rest) = config.frame_length.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }
    master.dispose();
    log::info!("Navigator thread stopped");
}
