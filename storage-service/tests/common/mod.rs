// SPDX-License-Identifier: GPL-3.0-only

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storage_contracts::{TimerCallback, TimerHandle, TimerService};
use storage_service::{ServiceConfig, SettingCatalog};
use tempfile::TempDir;

pub const STORAGE_SETTING: &str = "LMI_StorageSetting";

struct PendingTimer {
    name: String,
    delay: Duration,
    cancelled: Arc<AtomicBool>,
    callback: TimerCallback,
}

/// Timer service whose timers only fire when a test says so.
#[derive(Default)]
pub struct ManualTimers {
    pending: Mutex<Vec<PendingTimer>>,
}

struct ManualHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle for ManualHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl TimerService for ManualTimers {
    fn schedule(
        &self,
        name: &str,
        delay: Duration,
        callback: TimerCallback,
    ) -> Box<dyn TimerHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.pending.lock().expect("timer lock").push(PendingTimer {
            name: name.to_string(),
            delay,
            cancelled: Arc::clone(&cancelled),
            callback,
        });
        Box::new(ManualHandle { cancelled })
    }
}

impl ManualTimers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Names of timers that are neither cancelled nor fired.
    pub fn armed(&self) -> Vec<String> {
        self.pending
            .lock()
            .expect("timer lock")
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| timer.name.clone())
            .collect()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.pending
            .lock()
            .expect("timer lock")
            .iter()
            .map(|timer| timer.delay)
            .collect()
    }

    /// Run the callbacks of cancelled timers, as a timer service does when
    /// the delay elapsed just before the cancel. Live timers stay pending.
    pub fn run_cancelled(&self) -> usize {
        let late = {
            let mut pending = self.pending.lock().expect("timer lock");
            let (late, live): (Vec<PendingTimer>, Vec<PendingTimer>) = pending
                .drain(..)
                .partition(|timer| timer.cancelled.load(Ordering::SeqCst));
            *pending = live;
            late
        };
        let count = late.len();
        for timer in late {
            (timer.callback)();
        }
        count
    }

    /// Let every outstanding timer elapse. Returns how many callbacks ran.
    pub fn fire_all(&self) -> usize {
        let due: Vec<PendingTimer> = self.pending.lock().expect("timer lock").drain(..).collect();
        let mut fired = 0;
        for timer in due {
            if !timer.cancelled.load(Ordering::SeqCst) {
                (timer.callback)();
                fired += 1;
            }
        }
        fired
    }
}

/// Temporary preconfigured and persistent store roots.
pub struct Stores {
    _dir: TempDir,
    pub preconfigured: PathBuf,
    pub persistent: PathBuf,
}

impl Stores {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let preconfigured = dir.path().join("etc/settings");
        let persistent = dir.path().join("var/settings");
        Self {
            _dir: dir,
            preconfigured,
            persistent,
        }
    }

    pub fn config(&self) -> ServiceConfig {
        ServiceConfig {
            preconfigured_dir: self.preconfigured.clone(),
            persistent_dir: self.persistent.clone(),
            ..ServiceConfig::default()
        }
    }

    pub fn catalog(&self, timers: &Arc<ManualTimers>) -> SettingCatalog {
        SettingCatalog::new(&self.config(), timers.clone())
    }

    pub fn write_preconfigured(&self, class_name: &str, content: &str) {
        write_file(&self.preconfigured, class_name, content);
    }

    pub fn write_persistent(&self, class_name: &str, content: &str) {
        write_file(&self.persistent, class_name, content);
    }

    pub fn persistent_file(&self, class_name: &str) -> Option<String> {
        std::fs::read_to_string(self.persistent.join(class_name)).ok()
    }
}

fn write_file(dir: &Path, class_name: &str, content: &str) {
    std::fs::create_dir_all(dir).expect("create store dir");
    std::fs::write(dir.join(class_name), content).expect("write store file");
}

/// Stores shaped like a deployed system: two preconfigured and two
/// persistent storage settings.
pub fn full_stores() -> Stores {
    let stores = Stores::new();
    stores.write_preconfigured(
        STORAGE_SETTING,
        "[LMI:StorageSetting:preconfigured1]\n\
         first=1\n\
         second=two\n\
         third=3.0\n\
         \n\
         [LMI:StorageSetting:preconfigured2]\n\
         first=10\n\
         second=twenty\n\
         third=30.0\n",
    );
    stores.write_persistent(
        STORAGE_SETTING,
        "[LMI:StorageSetting:persistent1]\n\
         first=100\n\
         second=two hundred\n\
         third=300.0\n\
         \n\
         [LMI:StorageSetting:persistent2]\n\
         first=1000\n\
         second=two thousand\n\
         third=3000.0\n",
    );
    stores
}
