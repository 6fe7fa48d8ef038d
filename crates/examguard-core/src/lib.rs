//! Exam session state machine, integrity monitor and grading.
//!
//! An [`ExamSession`](session::ExamSession) drives one timed attempt: it
//! collects consent, runs the countdown, feeds host signals to the
//! [`IntegrityMonitor`](monitor::IntegrityMonitor) and finalizes exactly once,
//! whether the candidate submits, the timer expires or the violation budget
//! runs out. Hosts plug in through [`HostEnvironment`](host::HostEnvironment),
//! stores through [`AttemptSink`](traits::AttemptSink).

pub mod clock;
pub mod error;
pub mod host;
pub mod model;
pub mod monitor;
pub mod parser;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod simulate;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;
