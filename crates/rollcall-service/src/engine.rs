//! Serialized request engine.
//!
//! A dedicated OS thread owns the [`AttendanceService`] (and with it the
//! detector session and the database connection); callers talk to it
//! through a cloneable [`EngineHandle`]. Serializing requests through one
//! thread means two near-simultaneous submissions for the same student
//! cannot race the check-then-insert — exactly one of them marks.

use crate::service::{AttendanceService, AttendanceError, NewEnrollment, VerifyReport};
use chrono::NaiveDateTime;
use rollcall_store::MarkOutcome;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
    #[error("engine thread exited")]
    ChannelClosed,
}

enum EngineRequest {
    Enroll {
        enrollment: NewEnrollment,
        image: String,
        reply: oneshot::Sender<Result<(), AttendanceError>>,
    },
    Register {
        enrollment: NewEnrollment,
        image: String,
        reply: oneshot::Sender<Result<String, AttendanceError>>,
    },
    Verify {
        student_id: String,
        image: String,
        reply: oneshot::Sender<Result<VerifyReport, AttendanceError>>,
    },
    Mark {
        student_id: String,
        image: String,
        location: Option<(f64, f64)>,
        now: NaiveDateTime,
        reply: oneshot::Sender<Result<MarkOutcome, AttendanceError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub async fn enroll(
        &self,
        enrollment: NewEnrollment,
        image: String,
    ) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll {
                enrollment,
                image,
                reply,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?.map_err(Into::into)
    }

    pub async fn register(
        &self,
        enrollment: NewEnrollment,
        image: String,
    ) -> Result<String, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Register {
                enrollment,
                image,
                reply,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?.map_err(Into::into)
    }

    pub async fn verify(
        &self,
        student_id: String,
        image: String,
    ) -> Result<VerifyReport, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Verify {
                student_id,
                image,
                reply,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?.map_err(Into::into)
    }

    pub async fn mark(
        &self,
        student_id: String,
        image: String,
        location: Option<(f64, f64)>,
        now: NaiveDateTime,
    ) -> Result<MarkOutcome, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Mark {
                student_id,
                image,
                location,
                now,
                reply,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?.map_err(Into::into)
    }
}

/// Move the service onto its own thread and return a handle to it.
pub fn spawn_engine(mut service: AttendanceService) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll {
                        enrollment,
                        image,
                        reply,
                    } => {
                        let _ = reply.send(service.enroll(&enrollment, &image));
                    }
                    EngineRequest::Register {
                        enrollment,
                        image,
                        reply,
                    } => {
                        let _ = reply.send(service.submit_registration(&enrollment, &image));
                    }
                    EngineRequest::Verify {
                        student_id,
                        image,
                        reply,
                    } => {
                        let _ = reply.send(service.verify(&student_id, &image));
                    }
                    EngineRequest::Mark {
                        student_id,
                        image,
                        location,
                        now,
                        reply,
                    } => {
                        let _ = reply.send(service.mark_attendance(
                            &student_id,
                            &image,
                            location,
                            now,
                        ));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}
