use crate::core::config::Config;
use crate::core::engine::{PostureEngine, PostureSignal, SessionError, SessionResult};
use crate::core::storage::{load_or_default, StatisticsStore};
use crate::models::pose::{LandmarkFrame, PoseReading};
use crate::models::statistics::StatisticsRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Source of the current instant for everything a session timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ==============================================================================
// Commands
// ==============================================================================

#[derive(Debug)]
enum SessionCommand {
    Frame(LandmarkFrame),
    SaveGoodPosture {
        reply: oneshot::Sender<SessionResult<PoseReading>>,
    },
    SetActivity(String),
    SetWarningMethod(String),
    Statistics {
        reply: oneshot::Sender<StatisticsRecord>,
    },
    ResetStatistics {
        reply: oneshot::Sender<StatisticsRecord>,
    },
    PowerOff {
        reply: oneshot::Sender<SessionResult<StatisticsRecord>>,
    },
}

/// Cloneable handle to a running posture session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub async fn process_frame(&self, frame: LandmarkFrame) -> SessionResult<()> {
        self.send(SessionCommand::Frame(frame)).await
    }

    pub async fn save_good_posture(&self) -> SessionResult<PoseReading> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::SaveGoodPosture { reply }).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    pub async fn set_activity(&self, activity: &str) -> SessionResult<()> {
        self.send(SessionCommand::SetActivity(activity.to_string())).await
    }

    pub async fn set_warning_method(&self, method: &str) -> SessionResult<()> {
        self.send(SessionCommand::SetWarningMethod(method.to_string())).await
    }

    /// Snapshot of the in-memory record
    pub async fn statistics(&self) -> SessionResult<StatisticsRecord> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Statistics { reply }).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Zero the record. Resolves with the new record as soon as the session
    /// holds it; the background writer persists it.
    pub async fn reset_statistics(&self) -> SessionResult<StatisticsRecord> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::ResetStatistics { reply }).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Flush, persist and stop the session; resolves once the final save is done
    pub async fn power_off(&self) -> SessionResult<StatisticsRecord> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::PowerOff { reply }).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    async fn send(&self, command: SessionCommand) -> SessionResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::NotRunning)
    }
}

// ==============================================================================
// Session Manager
// ==============================================================================

pub struct SessionManager;

impl SessionManager {
    /// Load statistics and spawn the session pipeline task. Signals arrive on
    /// the returned receiver.
    pub async fn start(
        config: Config,
        store: Arc<dyn StatisticsStore>,
    ) -> SessionResult<(SessionHandle, mpsc::Receiver<PostureSignal>)> {
        Self::start_with_clock(config, store, Arc::new(Utc::now)).await
    }

    /// Same as `start`, reading the current instant from `clock`
    pub async fn start_with_clock(
        config: Config,
        store: Arc<dyn StatisticsStore>,
        clock: Clock,
    ) -> SessionResult<(SessionHandle, mpsc::Receiver<PostureSignal>)> {
        let record = load_or_default(store.as_ref()).await?;

        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::channel(config.signal_buffer);
        let (signal_tx, signal_rx) = mpsc::channel(config.signal_buffer);

        let checkpoint_period = Duration::from_secs(config.checkpoint_interval_seconds);
        let engine = PostureEngine::new(record, config);

        // Announce the pacing for the initial warning method
        emit(
            &signal_tx,
            PostureSignal::FrameIntervalChanged {
                interval_ms: engine.frame_interval_ms(),
            },
        );

        let task = SessionTask {
            id,
            engine,
            store,
            signals: signal_tx,
            clock,
        };
        tokio::spawn(task.run(command_rx, checkpoint_period));

        info!(session_id = %id, "Posture session started");
        Ok((SessionHandle { commands: command_tx }, signal_rx))
    }
}

/// State owned by the pipeline task. Every command, timer and frame for a
/// session is handled here, one at a time; persistence runs beside it.
struct SessionTask {
    id: Uuid,
    engine: PostureEngine,
    store: Arc<dyn StatisticsStore>,
    signals: mpsc::Sender<PostureSignal>,
    clock: Clock,
}

impl SessionTask {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        checkpoint_period: Duration,
    ) {
        let (save_tx, saver) = spawn_saver(self.store.clone(), self.signals.clone());

        let mut checkpoints = interval_at(Instant::now() + checkpoint_period, checkpoint_period);
        checkpoints.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Re-armed from the clock every pass so a late wakeup never drifts
            let boundary = tokio::time::sleep(self.engine.until_next_window(self.now()));

            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        // Every handle dropped: end the session as if powered off
                        let _ = self.shut_down(save_tx, saver).await;
                        break;
                    };
                    let now = self.now();

                    // Nothing in here waits on persistence
                    match command {
                        SessionCommand::Frame(frame) => {
                            for signal in self.engine.process_frame(&frame, now) {
                                emit(&self.signals, signal);
                            }
                        }
                        SessionCommand::SaveGoodPosture { reply } => {
                            let result = self.engine.save_good_posture(now);
                            match &result {
                                Ok(reading) => emit(
                                    &self.signals,
                                    PostureSignal::CalibrationSaved {
                                        pitch: reading.pitch_degrees,
                                        distance: reading.distance_cm,
                                    },
                                ),
                                Err(e) => warn!(error = %e, "Good posture not saved"),
                            }
                            let _ = reply.send(result);
                        }
                        SessionCommand::SetActivity(name) => {
                            if self.engine.set_activity(&name, now) {
                                let _ = save_tx.send(self.engine.checkpoint(now));
                            }
                        }
                        SessionCommand::SetWarningMethod(name) => {
                            let changed = self.engine.set_warning_method(&name);
                            for signal in changed.unwrap_or_default() {
                                emit(&self.signals, signal);
                            }
                        }
                        SessionCommand::Statistics { reply } => {
                            let _ = reply.send(self.engine.statistics().record().clone());
                        }
                        SessionCommand::ResetStatistics { reply } => {
                            let record = self.engine.reset_statistics(now);
                            let _ = save_tx.send(record.clone());
                            let _ = reply.send(record);
                        }
                        SessionCommand::PowerOff { reply } => {
                            let result = self.shut_down(save_tx, saver).await;
                            commands.close();
                            let _ = reply.send(result);
                            break;
                        }
                    }
                }
                _ = boundary => {
                    debug!(session_id = %self.id, "Time window boundary reached");
                    let now = self.now();
                    self.engine.on_time_window_tick(now);
                }
                _ = checkpoints.tick() => {
                    let now = self.now();
                    let _ = save_tx.send(self.engine.checkpoint(now));
                }
            }
        }

        info!(session_id = %self.id, "Posture session stopped");
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Final flush: undo warnings still on screen, stop the background writer
    /// after any in-flight save, then write the final record directly
    async fn shut_down(
        &mut self,
        save_tx: watch::Sender<StatisticsRecord>,
        saver: JoinHandle<()>,
    ) -> SessionResult<StatisticsRecord> {
        let (record, cleared) = self.engine.power_off(self.now());
        for signal in cleared {
            emit(&self.signals, signal);
        }

        drop(save_tx);
        if let Err(e) = saver.await {
            error!(error = %e, "Statistics writer task failed");
        }

        self.store.save(&record).await.map_err(|e| {
            error!(error = %e, "Failed to save final statistics");
            SessionError::from(e)
        })?;
        Ok(record)
    }
}

/// Latest-wins background writer: a slow save never stalls the pipeline and
/// a failed save is retried with the next checkpoint's record.
fn spawn_saver(
    store: Arc<dyn StatisticsStore>,
    signals: mpsc::Sender<PostureSignal>,
) -> (watch::Sender<StatisticsRecord>, JoinHandle<()>) {
    let (tx, mut rx) = watch::channel(StatisticsRecord::default());

    let handle = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let record = rx.borrow_and_update().clone();
            if let Err(e) = store.save(&record).await {
                warn!(error = %e, "Failed to save statistics");
                emit(
                    &signals,
                    PostureSignal::PersistenceFailed {
                        message: e.to_string(),
                    },
                );
            }
        }
    });

    (tx, handle)
}

fn emit(signals: &mpsc::Sender<PostureSignal>, signal: PostureSignal) {
    if let Err(e) = signals.try_send(signal) {
        warn!(error = %e, "Dropping posture signal");
    }
}
