use std::sync::Arc;

use lms_core::{store::keys, LmsError, LmsStore, StoreOptions};
use shared::{
    domain::{SubmissionStatus, UserId},
    protocol::{NewAssignment, NewCourse, RateCourse},
};
use storage::{KvStore, Storage};

const INSTRUCTOR: UserId = UserId(2);
const STUDENT: UserId = UserId(4);

#[tokio::test]
async fn student_completes_a_course_end_to_end() {
    let storage = Arc::new(Storage::new("sqlite::memory:").await.expect("db"));
    let store = LmsStore::open(storage.clone(), StoreOptions::default())
        .await
        .expect("open");

    let course = store
        .write(|s| {
            s.add_course(
                INSTRUCTOR,
                &NewCourse {
                    title: "Databases".into(),
                    category: "Data".into(),
                    tags: vec!["sql, storage".into()],
                    ..NewCourse::default()
                },
            )
        })
        .await
        .expect("course");
    assert_eq!(course.tags, vec!["sql".to_string(), "storage".to_string()]);

    let assignment = store
        .write(|s| {
            s.add_assignment(
                INSTRUCTOR,
                &NewAssignment {
                    title: "Normalize a schema".into(),
                    course_id: course.id,
                    due_date: None,
                    max_score: None,
                    description: "Third normal form".into(),
                },
            )
        })
        .await
        .expect("assignment");
    assert_eq!(assignment.max_score, 100);

    store
        .write(|s| s.enroll_student(STUDENT, STUDENT, course.id))
        .await
        .expect("enroll");
    let submission = store
        .write(|s| s.submit_assignment(STUDENT, assignment.id, "done"))
        .await
        .expect("submit");

    let early = store
        .write(|s| s.issue_certificate(STUDENT, course.id))
        .await
        .unwrap_err();
    assert!(matches!(early, LmsError::Validation(_)));

    let graded = store
        .write(|s| s.grade_submission(INSTRUCTOR, submission.id, 88, "solid"))
        .await
        .expect("grade");
    assert_eq!(graded.status, SubmissionStatus::Graded);

    store
        .write(|s| {
            s.rate_course(
                STUDENT,
                course.id,
                &RateCourse {
                    stars: 4,
                    review: "useful".into(),
                },
            )
        })
        .await
        .expect("rate");
    let certificate = store
        .write(|s| s.issue_certificate(STUDENT, course.id))
        .await
        .expect("certificate");
    assert_eq!(certificate.student_name, "Kumar");

    let enrollments = storage
        .get_item(keys::ENROLLMENTS)
        .await
        .expect("read")
        .expect("enrollments persisted");
    let parsed: serde_json::Value = serde_json::from_str(&enrollments).expect("json");
    assert_eq!(parsed[course.id.0.to_string()], serde_json::json!([4]));

    let reopened = LmsStore::open(storage, StoreOptions::default())
        .await
        .expect("reopen");
    let (rating, certificates) = reopened
        .read(|s| {
            (
                s.course(course.id).map(|c| c.rating),
                s.certificates_for(STUDENT).len(),
            )
        })
        .await;
    assert_eq!(rating, Some(4.0));
    assert_eq!(certificates, 1);
}
