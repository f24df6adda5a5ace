//! The attendance pipeline: enrollment, verification, and marking.

use crate::transport;
use chrono::NaiveDateTime;
use rollcall_core::{
    DescriptorExtractor, ExtractedFace, FaceDetector, GateDenied, GateSet, MatchPolicy,
    Descriptor,
};
use rollcall_store::{password, Db, MarkOutcome, NewStudent, StoreError};
use thiserror::Error;

/// User-facing failures of the attendance pipeline. All are recoverable;
/// the user re-captures and resubmits. Note that "already marked today" is
/// deliberately not here — it is a successful, idempotent outcome.
#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("student {0} has no enrolled face descriptor")]
    NotEnrolled(String),
    #[error("no face detected in the image")]
    NoFaceDetected,
    #[error("face verification failed")]
    FaceMismatch,
    #[error("attendance can only be marked during configured windows")]
    OutsideWindow,
    #[error("location is outside the campus geofence")]
    OutsideGeofence,
    #[error("liveness check failed")]
    LivenessFailed,
    #[error("stored descriptor is corrupt for student {0}")]
    CorruptDescriptor(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GateDenied> for AttendanceError {
    fn from(denied: GateDenied) -> Self {
        match denied {
            GateDenied::OutsideWindow => AttendanceError::OutsideWindow,
            GateDenied::OutsideGeofence => AttendanceError::OutsideGeofence,
            GateDenied::LivenessFailed => AttendanceError::LivenessFailed,
        }
    }
}

/// Details for enrolling a student or filing a registration request.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub password: String,
    pub email: Option<String>,
}

/// Result of a verification-only request.
#[derive(Debug, Clone, Copy)]
pub struct VerifyReport {
    pub matched: bool,
    /// Euclidean distance; `None` on a descriptor length mismatch.
    pub distance: Option<f32>,
}

/// Composition of detector, extractor, matcher, gates, and store.
///
/// Owns its resources; not `Sync`. Wrap it in
/// [`spawn_engine`](crate::engine::spawn_engine) to share it across
/// request handlers.
pub struct AttendanceService {
    detector: Box<dyn FaceDetector + Send>,
    extractor: DescriptorExtractor,
    policy: MatchPolicy,
    gates: GateSet,
    db: Db,
}

impl AttendanceService {
    pub fn new(
        detector: Box<dyn FaceDetector + Send>,
        db: Db,
        extractor: DescriptorExtractor,
        policy: MatchPolicy,
        gates: GateSet,
    ) -> Self {
        Self {
            detector,
            extractor,
            policy,
            gates,
            db,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Decode the transport payload and extract a descriptor. Every failure
    /// mode (bad base64, undecodable image, detector error, no face)
    /// collapses into `None`.
    fn extract(&mut self, image_payload: &str) -> Option<ExtractedFace> {
        let frame = transport::decode_image(image_payload)?;
        self.extractor
            .extract(self.detector.as_mut(), &frame.data, frame.width, frame.height)
    }

    /// Admin enrollment: create the student with a descriptor taken from
    /// the submitted photo. The photo is kept as the profile image.
    pub fn enroll(
        &mut self,
        enrollment: &NewEnrollment,
        image_payload: &str,
    ) -> Result<(), AttendanceError> {
        let extracted = self.extract(image_payload).ok_or(AttendanceError::NoFaceDetected)?;
        let descriptor = extracted
            .descriptor
            .to_json()
            .map_err(|_| AttendanceError::CorruptDescriptor(enrollment.id.clone()))?;

        self.db.insert_student(&NewStudent {
            id: enrollment.id.clone(),
            name: enrollment.name.clone(),
            class_name: enrollment.class_name.clone(),
            password_hash: password::hash_password(&enrollment.password),
            descriptor: Some(descriptor),
            profile_image: Some(image_payload.to_string()),
            email: enrollment.email.clone(),
        })?;
        Ok(())
    }

    /// Student self-registration: same extraction, but lands in the
    /// pending-approval queue. Returns the request id.
    pub fn submit_registration(
        &mut self,
        enrollment: &NewEnrollment,
        image_payload: &str,
    ) -> Result<String, AttendanceError> {
        let extracted = self.extract(image_payload).ok_or(AttendanceError::NoFaceDetected)?;
        let descriptor = extracted
            .descriptor
            .to_json()
            .map_err(|_| AttendanceError::CorruptDescriptor(enrollment.id.clone()))?;

        Ok(self.db.submit_request(&NewStudent {
            id: enrollment.id.clone(),
            name: enrollment.name.clone(),
            class_name: enrollment.class_name.clone(),
            password_hash: password::hash_password(&enrollment.password),
            descriptor: Some(descriptor),
            profile_image: Some(image_payload.to_string()),
            email: enrollment.email.clone(),
        })?)
    }

    fn stored_descriptor(&self, student_id: &str) -> Result<Descriptor, AttendanceError> {
        let student = self
            .db
            .get_student(student_id)?
            .ok_or_else(|| AttendanceError::StudentNotFound(student_id.to_string()))?;
        let json = student
            .descriptor
            .ok_or_else(|| AttendanceError::NotEnrolled(student_id.to_string()))?;
        Descriptor::from_json(&json)
            .map_err(|_| AttendanceError::CorruptDescriptor(student_id.to_string()))
    }

    /// 1:1 verification against the student's stored descriptor, without
    /// touching attendance.
    pub fn verify(
        &mut self,
        student_id: &str,
        image_payload: &str,
    ) -> Result<VerifyReport, AttendanceError> {
        let stored = self.stored_descriptor(student_id)?;
        let extracted = self.extract(image_payload).ok_or(AttendanceError::NoFaceDetected)?;
        Ok(VerifyReport {
            matched: self.policy.is_match(&stored, &extracted.descriptor),
            distance: self.policy.distance(&stored, &extracted.descriptor),
        })
    }

    /// The attendance-marking pipeline: lookup, extraction, gates, match,
    /// then the idempotent write. Gates and the face match are ANDed — all
    /// must pass before any record is written.
    pub fn mark_attendance(
        &mut self,
        student_id: &str,
        image_payload: &str,
        location: Option<(f64, f64)>,
        now: NaiveDateTime,
    ) -> Result<MarkOutcome, AttendanceError> {
        let stored = self.stored_descriptor(student_id)?;

        let extracted = self.extract(image_payload).ok_or(AttendanceError::NoFaceDetected)?;

        self.gates.evaluate(now.time(), location, &extracted.face)?;

        if !self.policy.is_match(&stored, &extracted.descriptor) {
            tracing::info!(student_id, "face verification failed");
            return Err(AttendanceError::FaceMismatch);
        }

        Ok(self.db.mark_attendance(student_id, now.date(), now.time())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use image::{GrayImage, ImageFormat, Luma};
    use rollcall_core::{DetectError, FaceBox, GeofenceGate, TimeWindow, TimeWindowGate};
    use std::io::Cursor;

    /// Detector stub: one full-frame face, eyes inside the box.
    struct WholeFrameDetector {
        with_landmarks: bool,
        detect_nothing: bool,
    }

    impl FaceDetector for WholeFrameDetector {
        fn detect(
            &mut self,
            _gray: &[u8],
            width: u32,
            height: u32,
        ) -> Result<Vec<FaceBox>, DetectError> {
            if self.detect_nothing {
                return Ok(vec![]);
            }
            let (w, h) = (width as f32, height as f32);
            let landmarks = self.with_landmarks.then(|| {
                [
                    (w * 0.3, h * 0.35),
                    (w * 0.7, h * 0.35),
                    (w * 0.5, h * 0.55),
                    (w * 0.35, h * 0.75),
                    (w * 0.65, h * 0.75),
                ]
            });
            Ok(vec![FaceBox {
                x: 0.0,
                y: 0.0,
                width: w,
                height: h,
                confidence: 0.98,
                landmarks,
            }])
        }
    }

    fn payload(fill: u8) -> String {
        let img = GrayImage::from_pixel(32, 32, Luma([fill]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        transport::encode_payload(buf.get_ref())
    }

    fn enrollment(id: &str) -> NewEnrollment {
        NewEnrollment {
            id: id.to_string(),
            name: "Asha Rao".to_string(),
            class_name: "10-B".to_string(),
            password: "pw".to_string(),
            email: None,
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn service_with(gates: GateSet) -> AttendanceService {
        AttendanceService::new(
            Box::new(WholeFrameDetector {
                with_landmarks: true,
                detect_nothing: false,
            }),
            Db::open_in_memory().unwrap(),
            DescriptorExtractor::new(100),
            MatchPolicy::default(),
            gates,
        )
    }

    #[test]
    fn test_enroll_then_mark_then_remark() {
        let mut svc = service_with(GateSet::default());
        svc.enroll(&enrollment("S001"), &payload(140)).unwrap();

        let first = svc
            .mark_attendance("S001", &payload(140), None, at(8, 30))
            .unwrap();
        assert!(matches!(first, MarkOutcome::Marked(_)));

        let second = svc
            .mark_attendance("S001", &payload(140), None, at(8, 45))
            .unwrap();
        let MarkOutcome::AlreadyMarked(record) = second else {
            panic!("second mark on the same day must be a no-op");
        };
        assert_eq!(record.time, "08:30:00");
        assert_eq!(svc.db().attendance_for_student("S001").unwrap().len(), 1);
    }

    #[test]
    fn test_mismatched_face_rejected() {
        let mut svc = service_with(GateSet::default());
        svc.enroll(&enrollment("S001"), &payload(0)).unwrap();

        // All-zero stored vs all-one candidate: distance 100 on a
        // 10,000-dim descriptor, well past the 30.0 threshold.
        let result = svc.mark_attendance("S001", &payload(255), None, at(8, 30));
        assert!(matches!(result, Err(AttendanceError::FaceMismatch)));
        assert!(svc.db().attendance_for_student("S001").unwrap().is_empty());
    }

    #[test]
    fn test_verify_report() {
        let mut svc = service_with(GateSet::default());
        svc.enroll(&enrollment("S001"), &payload(80)).unwrap();

        let same = svc.verify("S001", &payload(80)).unwrap();
        assert!(same.matched);
        assert_eq!(same.distance, Some(0.0));

        let other = svc.verify("S001", &payload(255)).unwrap();
        assert!(!other.matched);
    }

    #[test]
    fn test_no_face_detected() {
        let mut svc = AttendanceService::new(
            Box::new(WholeFrameDetector {
                with_landmarks: true,
                detect_nothing: true,
            }),
            Db::open_in_memory().unwrap(),
            DescriptorExtractor::new(100),
            MatchPolicy::default(),
            GateSet::default(),
        );
        let result = svc.enroll(&enrollment("S001"), &payload(100));
        assert!(matches!(result, Err(AttendanceError::NoFaceDetected)));
    }

    #[test]
    fn test_undecodable_payload_is_no_face() {
        let mut svc = service_with(GateSet::default());
        let result = svc.enroll(&enrollment("S001"), "!!garbage!!");
        assert!(matches!(result, Err(AttendanceError::NoFaceDetected)));
    }

    #[test]
    fn test_unenrolled_student() {
        let mut svc = service_with(GateSet::default());
        svc.db()
            .insert_student(&NewStudent {
                id: "S002".to_string(),
                name: "Ravi Kumar".to_string(),
                class_name: "9-A".to_string(),
                password_hash: password::hash_password("pw"),
                descriptor: None,
                profile_image: None,
                email: None,
            })
            .unwrap();

        let result = svc.mark_attendance("S002", &payload(100), None, at(8, 30));
        assert!(matches!(result, Err(AttendanceError::NotEnrolled(_))));

        let missing = svc.mark_attendance("S404", &payload(100), None, at(8, 30));
        assert!(matches!(missing, Err(AttendanceError::StudentNotFound(_))));
    }

    #[test]
    fn test_time_window_gate() {
        let t = |h, m| chrono::NaiveTime::from_hms_opt(h, m, 0).unwrap();
        let gates = GateSet {
            window: Some(TimeWindowGate::new(vec![
                TimeWindow {
                    start: t(8, 0),
                    end: t(9, 0),
                },
                TimeWindow {
                    start: t(13, 0),
                    end: t(14, 0),
                },
            ])),
            ..GateSet::default()
        };
        let mut svc = service_with(gates);
        svc.enroll(&enrollment("S001"), &payload(100)).unwrap();

        let late = svc.mark_attendance("S001", &payload(100), None, at(9, 30));
        assert!(matches!(late, Err(AttendanceError::OutsideWindow)));

        let on_time = svc
            .mark_attendance("S001", &payload(100), None, at(8, 45))
            .unwrap();
        assert!(matches!(on_time, MarkOutcome::Marked(_)));
    }

    #[test]
    fn test_geofence_gate() {
        let gates = GateSet {
            geofence: Some(GeofenceGate::new(12.9716, 77.5946, 0.5)),
            ..GateSet::default()
        };
        let mut svc = service_with(gates);
        svc.enroll(&enrollment("S001"), &payload(100)).unwrap();

        // No claimed location with a configured geofence: fail closed.
        let unlocated = svc.mark_attendance("S001", &payload(100), None, at(8, 30));
        assert!(matches!(unlocated, Err(AttendanceError::OutsideGeofence)));

        // ~5 km away.
        let off_campus =
            svc.mark_attendance("S001", &payload(100), Some((13.0166, 77.5946)), at(8, 30));
        assert!(matches!(off_campus, Err(AttendanceError::OutsideGeofence)));

        let on_campus = svc
            .mark_attendance("S001", &payload(100), Some((12.9718, 77.5948)), at(8, 30))
            .unwrap();
        assert!(matches!(on_campus, MarkOutcome::Marked(_)));
    }

    #[test]
    fn test_liveness_gate_needs_landmarks() {
        let gates = GateSet {
            liveness: Some(rollcall_core::LivenessGate::default()),
            ..GateSet::default()
        };
        let mut svc = AttendanceService::new(
            Box::new(WholeFrameDetector {
                with_landmarks: false,
                detect_nothing: false,
            }),
            Db::open_in_memory().unwrap(),
            DescriptorExtractor::new(100),
            MatchPolicy::default(),
            gates,
        );
        svc.enroll(&enrollment("S001"), &payload(100)).unwrap();

        let result = svc.mark_attendance("S001", &payload(100), None, at(8, 30));
        assert!(matches!(result, Err(AttendanceError::LivenessFailed)));
    }

    #[test]
    fn test_registration_flow_end_to_end() {
        let mut svc = service_with(GateSet::default());
        let request_id = svc
            .submit_registration(&enrollment("S010"), &payload(90))
            .unwrap();

        // Not a student until an admin approves.
        assert!(svc.db().get_student("S010").unwrap().is_none());

        // Approval happens on the store; the service only needs the
        // descriptor to have been captured at submission time.
        svc.db.approve_request(&request_id, None).unwrap();

        let outcome = svc
            .mark_attendance("S010", &payload(90), None, at(8, 30))
            .unwrap();
        assert!(matches!(outcome, MarkOutcome::Marked(_)));
    }
}

