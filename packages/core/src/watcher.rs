//! Disk attach/detach watching.
//!
//! A [`DiskWatcher`] lives on a dedicated background thread: it probes the
//! device enumerator, diffs successive snapshots, and forwards the resulting
//! attach/detach events into the orchestrator's command queue. The queue is
//! the only hand-off between the watcher thread and the dispatch thread.
//!
//! Per node path the delivered sequence always alternates: an appearance is
//! never followed by a second appearance without an intervening
//! disappearance, and a disappearance is only delivered for a node that
//! appeared before. Nothing is guaranteed about ordering across different
//! nodes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::disk::{DeviceEnumerator, DiskDevice};
use crate::error::{Error, Result};
use crate::orchestrator::OrchestratorCommand;

/// Cloneable remote control for a running watcher.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    stop: Arc<AtomicBool>,
}

impl WatcherHandle {
    /// Requests cooperative termination. Safe to call from any thread; the
    /// watcher exits after its current poll round.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Background disk-event source.
///
/// Constructed once at process start and moved into its thread; the spawner
/// keeps a [`WatcherHandle`] for shutdown.
pub struct DiskWatcher<E: DeviceEnumerator> {
    enumerator: E,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
}

impl<E: DeviceEnumerator> DiskWatcher<E> {
    pub fn new(enumerator: E, poll_interval: Duration) -> Self {
        Self {
            enumerator,
            poll_interval,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle for stopping this watcher.
    pub fn handle(&self) -> WatcherHandle {
        WatcherHandle {
            stop: Arc::clone(&self.stop),
        }
    }

    /// Runs the watch loop; does not return until [`WatcherHandle::stop`] is
    /// called or the queue receiver is dropped.
    ///
    /// The initial probe establishes the session: if it fails, the watcher
    /// reports `WatcherSession` immediately instead of retrying. Once
    /// running, a failed poll round is skipped (logged, no events emitted) so
    /// a transient scan error never fabricates detach events.
    pub fn run(self, sink: Sender<OrchestratorCommand>) -> Result<()> {
        let mut known: BTreeMap<String, u64> = BTreeMap::new();

        let initial = self
            .enumerator
            .enumerate()
            .map_err(|e| Error::WatcherSession {
                message: e.to_string(),
            })?;
        if !self.deliver(&sink, diff_snapshot(&mut known, initial)) {
            return Ok(());
        }

        while !self.stop.load(Ordering::Relaxed) {
            thread::sleep(self.poll_interval);

            match self.enumerator.enumerate() {
                Ok(devices) => {
                    if !self.deliver(&sink, diff_snapshot(&mut known, devices)) {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "device scan failed, skipping poll round");
                }
            }
        }

        debug!("disk watcher stopped");
        Ok(())
    }

    /// Sends events into the queue; returns false when the receiver is gone.
    fn deliver(&self, sink: &Sender<OrchestratorCommand>, events: Vec<OrchestratorCommand>) -> bool {
        for event in events {
            if sink.send(event).is_err() {
                debug!("orchestrator queue closed, stopping watcher");
                return false;
            }
        }
        true
    }
}

/// Diffs a fresh snapshot against the known inventory, updating it in place.
///
/// Disappearances are emitted for nodes that vanished, appearances for new
/// nodes. A size change on a persisting node is not an event; capacity is
/// captured at attach time.
fn diff_snapshot(
    known: &mut BTreeMap<String, u64>,
    devices: Vec<DiskDevice>,
) -> Vec<OrchestratorCommand> {
    let current: BTreeMap<String, u64> = devices
        .into_iter()
        .map(|d| (d.node_path, d.size_bytes))
        .collect();

    let mut events = Vec::new();
    for node_path in known.keys() {
        if !current.contains_key(node_path) {
            events.push(OrchestratorCommand::DiskDisappeared {
                node_path: node_path.clone(),
            });
        }
    }
    for (node_path, size_bytes) in &current {
        if !known.contains_key(node_path) {
            events.push(OrchestratorCommand::DiskAppeared {
                node_path: node_path.clone(),
                size_bytes: *size_bytes,
            });
        }
    }

    *known = current;
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    fn dev(node_path: &str, size_bytes: u64) -> DiskDevice {
        DiskDevice {
            node_path: node_path.to_string(),
            size_bytes,
        }
    }

    #[test]
    fn test_diff_snapshot_reports_appearances_and_disappearances() {
        let mut known = BTreeMap::new();

        let events = diff_snapshot(&mut known, vec![dev("/dev/sda1", 10), dev("/dev/sdb1", 20)]);
        assert_eq!(
            events,
            vec![
                OrchestratorCommand::DiskAppeared {
                    node_path: "/dev/sda1".to_string(),
                    size_bytes: 10,
                },
                OrchestratorCommand::DiskAppeared {
                    node_path: "/dev/sdb1".to_string(),
                    size_bytes: 20,
                },
            ]
        );

        // Unchanged snapshot: silence.
        let events = diff_snapshot(&mut known, vec![dev("/dev/sda1", 10), dev("/dev/sdb1", 20)]);
        assert!(events.is_empty());

        let events = diff_snapshot(&mut known, vec![dev("/dev/sdb1", 20)]);
        assert_eq!(
            events,
            vec![OrchestratorCommand::DiskDisappeared {
                node_path: "/dev/sda1".to_string(),
            }]
        );
    }

    #[test]
    fn test_diff_snapshot_ignores_size_changes() {
        let mut known = BTreeMap::new();
        diff_snapshot(&mut known, vec![dev("/dev/sda1", 10)]);

        let events = diff_snapshot(&mut known, vec![dev("/dev/sda1", 99)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_diff_snapshot_alternates_per_node() {
        let mut known = BTreeMap::new();
        let rounds: Vec<Vec<DiskDevice>> = vec![
            vec![dev("/dev/sda1", 1)],
            vec![],
            vec![dev("/dev/sda1", 1)],
            vec![dev("/dev/sda1", 1)],
            vec![],
        ];

        let mut appeared = false;
        for round in rounds {
            for event in diff_snapshot(&mut known, round) {
                match event {
                    OrchestratorCommand::DiskAppeared { .. } => {
                        assert!(!appeared, "appearance without intervening disappearance");
                        appeared = true;
                    }
                    OrchestratorCommand::DiskDisappeared { .. } => {
                        assert!(appeared, "disappearance without outstanding appearance");
                        appeared = false;
                    }
                    _ => unreachable!(),
                }
            }
        }
    }

    /// Enumerator scripted with one result per poll round; stops the watcher
    /// when the script runs out.
    struct ScriptedEnumerator {
        script: Mutex<Vec<Result<Vec<DiskDevice>>>>,
        handle: Mutex<Option<WatcherHandle>>,
    }

    impl ScriptedEnumerator {
        fn new(script: Vec<Result<Vec<DiskDevice>>>) -> Self {
            Self {
                script: Mutex::new(script),
                handle: Mutex::new(None),
            }
        }
    }

    impl DeviceEnumerator for &ScriptedEnumerator {
        fn enumerate(&self) -> Result<Vec<DiskDevice>> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                if let Some(handle) = self.handle.lock().unwrap().as_ref() {
                    handle.stop();
                }
                return Err(Error::EnumerateParse {
                    message: "script exhausted".to_string(),
                });
            }
            script.remove(0)
        }
    }

    #[test]
    fn test_run_delivers_initial_inventory_and_diffs() {
        let enumerator = ScriptedEnumerator::new(vec![
            Ok(vec![dev("/dev/sda1", 10)]),
            Ok(vec![dev("/dev/sda1", 10), dev("/dev/sdb1", 20)]),
            Err(Error::EnumerateParse {
                message: "transient".to_string(),
            }),
            Ok(vec![dev("/dev/sdb1", 20)]),
        ]);

        let watcher = DiskWatcher::new(&enumerator, Duration::ZERO);
        *enumerator.handle.lock().unwrap() = Some(watcher.handle());

        let (tx, rx) = mpsc::channel();
        watcher.run(tx).unwrap();

        let received: Vec<_> = rx.iter().collect();
        assert_eq!(
            received,
            vec![
                OrchestratorCommand::DiskAppeared {
                    node_path: "/dev/sda1".to_string(),
                    size_bytes: 10,
                },
                OrchestratorCommand::DiskAppeared {
                    node_path: "/dev/sdb1".to_string(),
                    size_bytes: 20,
                },
                OrchestratorCommand::DiskDisappeared {
                    node_path: "/dev/sda1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_run_fails_fast_when_session_cannot_be_established() {
        let enumerator = ScriptedEnumerator::new(vec![Err(Error::Enumerate {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "lsblk missing"),
        })]);

        let watcher = DiskWatcher::new(&enumerator, Duration::ZERO);
        let (tx, _rx) = mpsc::channel();

        assert!(matches!(
            watcher.run(tx),
            Err(Error::WatcherSession { .. })
        ));
    }

    #[test]
    fn test_run_exits_when_receiver_is_dropped() {
        let enumerator = ScriptedEnumerator::new(vec![
            Ok(vec![dev("/dev/sda1", 10)]),
            Ok(vec![]),
            Ok(vec![dev("/dev/sda1", 10)]),
        ]);

        let watcher = DiskWatcher::new(&enumerator, Duration::ZERO);
        let (tx, rx) = mpsc::channel();
        drop(rx);

        watcher.run(tx).unwrap();
        // Script not exhausted: the watcher left on the first failed send.
        assert!(!enumerator.script.lock().unwrap().is_empty());
    }
}
