//! Thread-per-node scheduler for streaming graphs
//!
//! Each node gets a dedicated thread that calls `work()` in a loop until the
//! node asks to stop, the scheduler is stopped, or `work()` fails. A step that
//! reports no work (`Ok(0)`) is followed by a short sleep before the next call.

use super::node::ProcessNode;
use super::ports::{InputPort, OutputPort};
use super::watchdog::Watchdog;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver as StdReceiver, Sender as StdSender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Runtime scheduler that executes a streaming graph
pub struct Scheduler {
    threads: Vec<(String, JoinHandle<()>)>,
    stop_signal: Arc<AtomicBool>,
    completion_tx: StdSender<String>,
    completion_rx: StdReceiver<String>,
    idle_backoff: Duration,
    watchdog: Watchdog,
    watchdog_handle: JoinHandle<()>,
}

impl Scheduler {
    /// Create a new scheduler with watchdog monitoring
    pub fn new() -> Self {
        Self::with_watchdog(Watchdog::new())
    }

    pub fn with_watchdog(watchdog: Watchdog) -> Self {
        let (completion_tx, completion_rx) = channel();
        let watchdog_handle = watchdog.start_monitoring_thread();
        info!(
            "Watchdog enabled - will report operations blocked >{:?}",
            watchdog.threshold()
        );
        Self {
            threads: Vec::new(),
            stop_signal: Arc::new(AtomicBool::new(false)),
            completion_tx,
            completion_rx,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            watchdog,
            watchdog_handle,
        }
    }

    /// Sleep applied after a `work()` call that produced nothing
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Start a node in its own thread
    pub fn start_process(
        &mut self,
        mut node: Box<dyn ProcessNode>,
        inputs: Vec<InputPort>,
        outputs: Vec<OutputPort>,
    ) {
        let stop_signal = Arc::clone(&self.stop_signal);
        let completion_tx = self.completion_tx.clone();
        let idle_backoff = self.idle_backoff;
        let name = node.name().to_string();
        let thread_name = name.clone();

        debug!("Starting process node: {}", name);

        let handle = thread::spawn(move || {
            let mut items_produced = 0usize;
            let mut idle_steps = 0usize;

            while !stop_signal.load(Ordering::Relaxed) && !node.should_stop() {
                match node.work(&inputs, &outputs) {
                    Ok(0) => {
                        idle_steps += 1;
                        thread::sleep(idle_backoff);
                    }
                    Ok(n) => items_produced += n,
                    Err(e) => {
                        error!("[{}] Work error: {}", thread_name, e);
                        break;
                    }
                }
            }

            info!(
                "[{}] Shutdown. Produced {} items ({} idle steps).",
                thread_name, items_produced, idle_steps
            );

            // Drop ports before reporting so downstream channels disconnect
            drop(outputs);
            drop(inputs);
            drop(node);

            let _ = completion_tx.send(thread_name);
        });

        self.threads.push((name, handle));
    }

    /// Signal all nodes to stop after their current step
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::Relaxed);
    }

    /// Wait for all node threads to complete, joining each as it finishes
    pub fn wait(self) {
        let Scheduler {
            threads,
            completion_tx,
            completion_rx,
            watchdog,
            watchdog_handle,
            ..
        } = self;

        // Channel closes once every node thread has dropped its clone
        drop(completion_tx);

        let total = threads.len();
        let mut completed = 0;
        let mut by_name: HashMap<String, JoinHandle<()>> = threads.into_iter().collect();

        info!("Waiting for {} threads to complete...", total);

        while let Ok(thread_name) = completion_rx.recv() {
            completed += 1;
            if let Some(handle) = by_name.remove(&thread_name) {
                match handle.join() {
                    Ok(()) => info!("[{}] Thread completed ({}/{})", thread_name, completed, total),
                    Err(e) => error!(
                        "[{}] Thread panicked ({}/{}): {:?}",
                        thread_name, completed, total, e
                    ),
                }
            }
        }

        // Threads that panicked never reported completion
        for (thread_name, handle) in by_name {
            if handle.join().is_err() {
                error!("[{}] Thread panicked", thread_name);
            }
        }

        info!("All {} threads completed", total);

        watchdog.stop();
        let _ = watchdog_handle.join();
    }

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::node::{WorkError, WorkResult};
    use crate::runtime::sender::{ChannelMessage, Sender};
    use crossbeam_channel::bounded;
    use std::sync::Mutex;

    struct CountingSource {
        count: u32,
        max: u32,
    }

    impl ProcessNode for CountingSource {
        fn name(&self) -> &str {
            "counting_source"
        }

        fn should_stop(&self) -> bool {
            self.count >= self.max
        }

        fn num_inputs(&self) -> usize {
            0
        }

        fn num_outputs(&self) -> usize {
            1
        }

        fn work(&mut self, _inputs: &[InputPort], outputs: &[OutputPort]) -> WorkResult<usize> {
            let output = outputs[0]
                .get::<u32>()
                .ok_or_else(|| WorkError::NodeError("Missing output channel".to_string()))?;
            output.send(self.count)?;
            self.count += 1;
            if self.count == self.max {
                output.close();
            }
            Ok(1)
        }
    }

    struct RecordingSink {
        received: Arc<Mutex<Vec<u32>>>,
        done: bool,
    }

    impl ProcessNode for RecordingSink {
        fn name(&self) -> &str {
            "recording_sink"
        }

        fn should_stop(&self) -> bool {
            self.done
        }

        fn num_inputs(&self) -> usize {
            1
        }

        fn num_outputs(&self) -> usize {
            0
        }

        fn work(&mut self, inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
            let mut input = inputs[0]
                .get::<u32>()
                .ok_or_else(|| WorkError::NodeError("Missing input channel".to_string()))?;
            match input.recv() {
                Ok(value) => {
                    self.received.lock().unwrap().push(value);
                    Ok(1)
                }
                Err(WorkError::Shutdown) => {
                    self.done = true;
                    Ok(0)
                }
                Err(e) => Err(e),
            }
        }
    }

    struct IdleNode {
        calls: Arc<Mutex<usize>>,
    }

    impl ProcessNode for IdleNode {
        fn name(&self) -> &str {
            "idle"
        }

        fn num_inputs(&self) -> usize {
            0
        }

        fn num_outputs(&self) -> usize {
            0
        }

        fn work(&mut self, _inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
            *self.calls.lock().unwrap() += 1;
            Ok(0)
        }
    }

    #[test]
    fn test_source_to_sink() {
        let mut scheduler = Scheduler::new();
        let watchdog = scheduler.watchdog().clone();
        let (tx, rx) = bounded::<ChannelMessage<u32>>(10);

        let received = Arc::new(Mutex::new(Vec::new()));
        scheduler.start_process(
            Box::new(CountingSource { count: 0, max: 5 }),
            vec![],
            vec![OutputPort::new_with_watchdog(Sender::new(vec![tx]), &watchdog, "counting_source", "out")],
        );
        scheduler.start_process(
            Box::new(RecordingSink {
                received: Arc::clone(&received),
                done: false,
            }),
            vec![InputPort::new_with_watchdog(rx, &watchdog, "recording_sink", "in")],
            vec![],
        );

        assert_eq!(scheduler.num_threads(), 2);
        scheduler.wait();
        assert_eq!(*received.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_idle_steps_back_off_until_stopped() {
        let mut scheduler = Scheduler::new().with_idle_backoff(Duration::from_millis(20));
        let calls = Arc::new(Mutex::new(0));
        scheduler.start_process(
            Box::new(IdleNode {
                calls: Arc::clone(&calls),
            }),
            vec![],
            vec![],
        );

        thread::sleep(Duration::from_millis(100));
        scheduler.stop();
        scheduler.wait();

        // Without backoff this would spin thousands of times
        let calls = *calls.lock().unwrap();
        assert!(calls >= 1 && calls < 20, "unexpected call count {}", calls);
    }
}
