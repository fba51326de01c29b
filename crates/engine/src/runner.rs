use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::{Bar, Error, Result};

use crate::simulator::{BacktestObserver, BacktestResult, BacktestSimulator};

/// Terminal destination of a backtest run.
pub trait ResultSink: Send + Sync {
    fn on_result(&self, run_id: Uuid, result: &BacktestResult);
    fn on_error(&self, run_id: Uuid, message: &str);
}

/// Sink that only logs the outcome.
pub struct LogSink;

impl ResultSink for LogSink {
    fn on_result(&self, run_id: Uuid, result: &BacktestResult) {
        info!(%run_id, trades = result.trade_count, pnl = result.final_pnl, "Backtest result ready");
    }

    fn on_error(&self, run_id: Uuid, message: &str) {
        error!(%run_id, error = message, "Backtest failed");
    }
}

/// Runs at most one backtest at a time on the blocking thread pool.
pub struct BacktestRunner {
    running: Arc<AtomicBool>,
    sink: Arc<dyn ResultSink>,
}

impl BacktestRunner {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            sink,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a run. A request while another run is active is rejected with
    /// `BacktestAlreadyRunning`, not queued.
    pub fn start(&self, simulator: Arc<BacktestSimulator>, bars: Vec<Bar>) -> Result<BacktestHandle> {
        self.launch(move |observer| simulator.run(&bars, observer))
    }

    fn launch<F>(&self, job: F) -> Result<BacktestHandle>
    where
        F: FnOnce(&dyn BacktestObserver) -> Result<BacktestResult> + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Backtest requested while another is running");
            return Err(Error::BacktestAlreadyRunning);
        }

        let guard = RunGuard(self.running.clone());
        let run_id = Uuid::new_v4();
        let (progress_tx, progress_rx) = watch::channel(0.0);
        let cancel = Arc::new(AtomicBool::new(false));
        let observer = ChannelObserver {
            progress: progress_tx,
            cancel: cancel.clone(),
        };
        let sink = self.sink.clone();

        info!(%run_id, "Backtest started");
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let outcome = job(&observer);
            match &outcome {
                Ok(result) => sink.on_result(run_id, result),
                Err(e) => sink.on_error(run_id, &e.to_string()),
            }
            outcome
        });

        Ok(BacktestHandle {
            run_id,
            progress: progress_rx,
            cancel,
            task,
        })
    }
}

/// Clears the running flag when the worker ends, even by panic.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct ChannelObserver {
    progress: watch::Sender<f64>,
    cancel: Arc<AtomicBool>,
}

impl BacktestObserver for ChannelObserver {
    fn on_progress(&self, percent: f64) {
        self.progress.send_replace(percent);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Caller's view of a running backtest.
pub struct BacktestHandle {
    run_id: Uuid,
    progress: watch::Receiver<f64>,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<Result<BacktestResult>>,
}

impl BacktestHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Latest reported progress, `0..=100`.
    pub fn progress(&self) -> f64 {
        *self.progress.borrow()
    }

    /// Receiver that wakes on every progress update.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Ask the run to stop at the next bar boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub async fn wait(self) -> Result<BacktestResult> {
        self.task
            .await
            .map_err(|e| Error::Other(format!("backtest worker failed: {e}")))?
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
