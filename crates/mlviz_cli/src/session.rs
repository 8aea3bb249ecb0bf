//! The auto-advance loop: wait for ticks, fire them, report frames.

use std::future::Future;
use std::io::Write;

use mlviz::driver::{HaltReason, Simulation, TickReply, TickTicket};
use mlviz::lessons::{ActiveLesson, Frame};
use mlviz::schedule::Runner;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::CliError;
use crate::ticker::TokioScheduler;

pub type LessonRunner = Runner<ActiveLesson, TokioScheduler>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    /// Ticks that stepped the lesson.
    pub ticks: u64,
    /// Tickets that arrived after their run was cancelled.
    pub stale: u64,
    pub halt: Option<HaltReason>,
    pub interrupted: bool,
}

/// Where per-tick frames go.
pub enum FrameSink<W: Write> {
    /// One JSON object per line.
    Json(W),
    /// `tracing` at info level.
    Log,
}

impl<W: Write> FrameSink<W> {
    fn emit(&mut self, runner: &LessonRunner) -> Result<(), CliError> {
        let frame = Frame::capture(runner.driver());
        match self {
            FrameSink::Json(out) => {
                serde_json::to_writer(&mut *out, &frame)?;
                out.write_all(b"\n")?;
            }
            FrameSink::Log => {
                let metrics = frame
                    .metrics
                    .iter()
                    .map(|m| format!("{}={:.4}", m.name, m.value))
                    .collect::<Vec<_>>()
                    .join(" ");
                info!(lesson = frame.lesson.label(), iteration = frame.iteration, "{metrics}");
            }
        }
        Ok(())
    }
}

/// Start the runner and drive it until it halts or `shutdown` resolves.
pub async fn run_session<W, F>(
    runner: &mut LessonRunner,
    ticks: &mut mpsc::UnboundedReceiver<TickTicket>,
    sink: &mut FrameSink<W>,
    shutdown: F,
) -> Result<SessionReport, CliError>
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut report = SessionReport::default();

    if !runner.start() {
        report.halt = runner.driver().halt_reason();
        info!(phase = ?runner.driver().phase(), "nothing to run");
        return Ok(report);
    }
    info!(
        lesson = runner.driver().sim().kind().label(),
        delay_ms = runner.delay().as_millis() as u64,
        "auto-advance started"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                runner.stop();
                report.interrupted = true;
                warn!("interrupted; pending tick cancelled");
                break;
            }
            ticket = ticks.recv() => {
                let Some(ticket) = ticket else { break };
                match runner.fire(ticket) {
                    TickReply::Stale => {
                        report.stale += 1;
                        debug!(epoch = ticket.epoch(), "stale tick ignored");
                    }
                    TickReply::Continue => {
                        report.ticks += 1;
                        sink.emit(runner)?;
                    }
                    TickReply::Halted(reason) => {
                        report.ticks += 1;
                        report.halt = Some(reason);
                        sink.emit(runner)?;
                        info!(?reason, iteration = runner.driver().sim().iteration(), "halted");
                        break;
                    }
                }
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mlviz::driver::DriverPhase;
    use mlviz::lessons::{new_driver, LessonKind};
    use mlviz::prng::Prng;

    use super::*;

    fn runner(kind: LessonKind, delay_ms: u64) -> (LessonRunner, mpsc::UnboundedReceiver<TickTicket>) {
        let (sched, rx) = TokioScheduler::new();
        (
            Runner::new(new_driver(kind, Prng::new(11)), sched, Duration::from_millis(delay_ms)),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn roc_sweep_runs_to_convergence() {
        let (mut runner, mut rx) = runner(LessonKind::Roc, 200);
        let mut sink = FrameSink::Json(Vec::new());
        let report = run_session(&mut runner, &mut rx, &mut sink, std::future::pending())
            .await
            .unwrap();

        assert_eq!(report.halt, Some(HaltReason::Converged));
        assert_eq!(report.ticks, 101);
        assert_eq!(runner.driver().phase(), DriverPhase::Converged);
        assert!(!runner.is_pending());

        let FrameSink::Json(buf) = sink else { unreachable!() };
        let lines: Vec<&str> = std::str::from_utf8(&buf).unwrap().lines().collect();
        assert_eq!(lines.len(), 101);
        let last: serde_json::Value = serde_json::from_str(lines[100]).unwrap();
        assert_eq!(last["iteration"], 101);
        assert_eq!(last["phase"], "Converged");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_mutation() {
        let (mut runner, mut rx) = runner(LessonKind::Roc, 100);
        let mut sink: FrameSink<Vec<u8>> = FrameSink::Log;
        let shutdown = tokio::time::sleep(Duration::from_millis(1050));
        let report = run_session(&mut runner, &mut rx, &mut sink, shutdown).await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.ticks, 10);
        let mutations = runner.driver().mutations();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(runner.driver().mutations(), mutations);
        assert_eq!(runner.driver().sim().iteration(), 10);
        assert_eq!(runner.driver().phase(), DriverPhase::Stepping);
    }

    #[tokio::test(start_paused = true)]
    async fn iteration_cap_halts() {
        let (mut runner, mut rx) = runner(LessonKind::LinearRegression, 10);
        runner.set_param("max_iterations", 5.0).unwrap();
        runner.set_param("learning_rate", 0.001).unwrap();
        let mut sink: FrameSink<Vec<u8>> = FrameSink::Log;
        let report = run_session(&mut runner, &mut rx, &mut sink, std::future::pending())
            .await
            .unwrap();
        assert_eq!(report.halt, Some(HaltReason::IterationCap));
        assert_eq!(report.ticks, 5);

        // Starting again at the cap is refused.
        let again = run_session(&mut runner, &mut rx, &mut sink, std::future::pending())
            .await
            .unwrap();
        assert_eq!(again.ticks, 0);
        assert_eq!(again.halt, Some(HaltReason::IterationCap));
    }
}
