use std::collections::BTreeMap;

use crate::domain::attendance::AttendanceRecord;
use crate::domain::change::{
    ChangeKind, DocumentChange, ATTENDANCE_RECORDS, HOMEWORKS, RIDES, SUBMISSIONS,
};
use crate::domain::homework::{HomeworkAssignment, HomeworkSubmission};
use crate::domain::notification::NotificationCategory;
use crate::domain::ride::{BusRide, StudentRideStatus};
use crate::usecase::contracts::SchoolDirectory;
use crate::usecase::error::UsecaseError;
use crate::usecase::notifications::{FanOut, Notice, StudentTarget, TeacherTarget};

/// One reaction to a kind of document change. Several rules may share a trigger;
/// every ride update is offered to all three ride rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    HomeworkCreated,
    HomeworkUpdated,
    AttendanceMarked,
    BusStatusChanged,
    StudentAddedToRide,
    StudentRideStatusChanged,
    HomeworkSubmitted,
}

impl Rule {
    pub const ALL: [Rule; 7] = [
        Rule::HomeworkCreated,
        Rule::HomeworkUpdated,
        Rule::AttendanceMarked,
        Rule::BusStatusChanged,
        Rule::StudentAddedToRide,
        Rule::StudentRideStatusChanged,
        Rule::HomeworkSubmitted,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::HomeworkCreated => "homework_created",
            Rule::HomeworkUpdated => "homework_updated",
            Rule::AttendanceMarked => "attendance_marked",
            Rule::BusStatusChanged => "bus_status_changed",
            Rule::StudentAddedToRide => "student_added_to_ride",
            Rule::StudentRideStatusChanged => "student_ride_status_changed",
            Rule::HomeworkSubmitted => "homework_submitted",
        }
    }

    pub fn trigger(&self) -> (&'static str, ChangeKind) {
        match self {
            Rule::HomeworkCreated => (HOMEWORKS, ChangeKind::Created),
            Rule::HomeworkUpdated => (HOMEWORKS, ChangeKind::Updated),
            Rule::AttendanceMarked => (ATTENDANCE_RECORDS, ChangeKind::Created),
            Rule::BusStatusChanged
            | Rule::StudentAddedToRide
            | Rule::StudentRideStatusChanged => (RIDES, ChangeKind::Updated),
            Rule::HomeworkSubmitted => (SUBMISSIONS, ChangeKind::Created),
        }
    }

    pub fn matching(change: &DocumentChange) -> Vec<Rule> {
        Rule::ALL
            .into_iter()
            .filter(|rule| {
                let (collection, kind) = rule.trigger();
                collection == change.collection && kind == change.kind
            })
            .collect()
    }

    /// Decides whether `change` is worth notifying about and, if so, whom and what.
    pub async fn plan<D: SchoolDirectory>(
        &self,
        change: &DocumentChange,
        directory: &D,
    ) -> Result<Option<FanOut>, UsecaseError> {
        match self {
            Rule::HomeworkCreated => homework_created(change, directory).await,
            Rule::HomeworkUpdated => homework_updated(change),
            Rule::AttendanceMarked => attendance_marked(change, directory).await,
            Rule::BusStatusChanged => bus_status_changed(change),
            Rule::StudentAddedToRide => student_added_to_ride(change),
            Rule::StudentRideStatusChanged => student_ride_status_changed(change),
            Rule::HomeworkSubmitted => homework_submitted(change, directory).await,
        }
    }
}

fn data(key: &str, value: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(key.to_string(), value.to_string())])
}

fn each_student(
    students: &[String],
    student: &Notice,
    guardians: &Notice,
) -> Vec<StudentTarget> {
    students
        .iter()
        .map(|id| StudentTarget {
            student_id: id.clone(),
            student: student.clone(),
            guardians: guardians.clone(),
        })
        .collect()
}

async fn homework_created<D: SchoolDirectory>(
    change: &DocumentChange,
    directory: &D,
) -> Result<Option<FanOut>, UsecaseError> {
    let homework: HomeworkAssignment = change.after_as()?;

    let teacher_id = match directory.find_subject(&homework.subject_id).await? {
        Some(subject) => subject.teacher_id,
        None => {
            tracing::warn!(subject_id = %homework.subject_id, "subject not found, teacher will not be notified");
            None
        }
    };

    let title = &homework.title;
    let student = Notice::new(
        "New Homework Assigned",
        format!("New homework assigned: {title}"),
    )
    .with_body(format!(
        "You have new homework: {title}. Due date: {}",
        homework.due_date_label()
    ));
    let guardians = Notice::new(
        "Homework Assigned to Your Child",
        format!("Homework assigned to your child: {title}"),
    );
    let teacher = teacher_id.map(|teacher_id| TeacherTarget {
        teacher_id,
        notice: Notice::new(
            "Homework Assignment Created",
            format!(
                "You assigned homework \"{title}\" to {} student(s)",
                homework.assigned_to.len()
            ),
        ),
    });

    Ok(Some(FanOut {
        category: NotificationCategory::Homework,
        related_id: change.document_id.clone(),
        data: data("homeworkId", &change.document_id),
        students: each_student(&homework.assigned_to, &student, &guardians),
        teacher,
    }))
}

fn homework_updated(change: &DocumentChange) -> Result<Option<FanOut>, UsecaseError> {
    let previous: HomeworkAssignment = change.before_as()?;
    let homework: HomeworkAssignment = change.after_as()?;

    if !homework.is_materially_changed(&previous) {
        return Ok(None);
    }

    let title = &homework.title;
    let student = Notice::new("Homework Updated", format!("Homework updated: {title}"))
        .with_body(format!(
            "Homework updated: {title}. Due date: {}",
            homework.due_date_label()
        ));
    let guardians = Notice::new(
        "Homework Updated for Your Child",
        format!("Homework updated for your child: {title}"),
    );

    Ok(Some(FanOut {
        category: NotificationCategory::Homework,
        related_id: change.document_id.clone(),
        data: data("homeworkId", &change.document_id),
        students: each_student(&homework.assigned_to, &student, &guardians),
        teacher: None,
    }))
}

async fn attendance_marked<D: SchoolDirectory>(
    change: &DocumentChange,
    directory: &D,
) -> Result<Option<FanOut>, UsecaseError> {
    let record: AttendanceRecord = change.after_as()?;
    let subject_name = attendance_subject_name(record.session_id.as_deref(), directory).await?;
    let status = &record.status;

    // Records without a session still link somewhere useful.
    let related_id = record
        .session_id
        .clone()
        .unwrap_or_else(|| change.document_id.clone());

    let student = Notice::new(
        "Attendance Update",
        format!("Your attendance for {subject_name} was marked as {status}"),
    );
    let guardians = Notice::new(
        "Child Attendance Update",
        format!("Attendance for your child in {subject_name} was marked as {status}"),
    );

    Ok(Some(FanOut {
        category: NotificationCategory::Attendance,
        data: data("sessionId", &related_id),
        related_id,
        students: each_student(&[record.student_id], &student, &guardians),
        teacher: None,
    }))
}

/// Subject name via session -> subject, "Class" when either link is missing.
async fn attendance_subject_name<D: SchoolDirectory>(
    session_id: Option<&str>,
    directory: &D,
) -> Result<String, UsecaseError> {
    const FALLBACK: &str = "Class";

    let Some(session_id) = session_id else {
        return Ok(FALLBACK.to_string());
    };
    let Some(session) = directory.find_attendance_session(session_id).await? else {
        return Ok(FALLBACK.to_string());
    };
    let Some(subject_id) = session.subject_id else {
        return Ok(FALLBACK.to_string());
    };

    let name = directory
        .find_subject(&subject_id)
        .await?
        .and_then(|subject| subject.name)
        .filter(|name| !name.is_empty());
    Ok(name.unwrap_or_else(|| FALLBACK.to_string()))
}

pub fn bus_status_message(status: Option<&str>, route: &str) -> String {
    match status {
        Some("started") => format!("Bus has started journey for {route}"),
        Some("completed") => format!("Bus has completed journey for {route}"),
        Some("in-transit") => "Your bus is in transit".to_string(),
        Some("arriving") => "Your bus is arriving soon".to_string(),
        Some("departed") => "Your bus has departed".to_string(),
        Some("delayed") => "Your bus is delayed".to_string(),
        Some("on_time") => "Your bus is on schedule".to_string(),
        Some("pending") => "Bus ride is pending".to_string(),
        Some(other) => format!("Bus status updated to {other}"),
        None => "Bus status updated".to_string(),
    }
}

fn bus_status_changed(change: &DocumentChange) -> Result<Option<FanOut>, UsecaseError> {
    let previous: BusRide = change.before_as()?;
    let ride: BusRide = change.after_as()?;

    if !ride.is_status_or_location_changed(&previous) {
        return Ok(None);
    }

    let text = bus_status_message(ride.status.as_deref(), ride.route_label());
    let student = Notice::new("Bus Status Update", text.clone());
    let guardians = Notice::new("Child Bus Update", format!("Bus update for your child: {text}"));

    Ok(Some(FanOut {
        category: NotificationCategory::Bus,
        related_id: change.document_id.clone(),
        data: data("rideId", &change.document_id),
        students: each_student(&ride.student_ids, &student, &guardians),
        teacher: None,
    }))
}

fn student_added_to_ride(change: &DocumentChange) -> Result<Option<FanOut>, UsecaseError> {
    let previous: BusRide = change.before_as()?;
    let ride: BusRide = change.after_as()?;

    let added = ride.added_students(&previous);
    if added.is_empty() {
        return Ok(None);
    }

    let route = ride.route_label();
    let driver = ride
        .driver_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or("A driver");
    let student = Notice::new(
        "Added to Bus Ride",
        format!("You have been added to bus ride for {route}"),
    );
    let guardians = Notice::new(
        "Child Added to Bus Ride",
        format!("{driver} added your child to bus ride for {route}"),
    );

    Ok(Some(FanOut {
        category: NotificationCategory::Bus,
        related_id: change.document_id.clone(),
        data: data("rideId", &change.document_id),
        students: each_student(&added, &student, &guardians),
        teacher: None,
    }))
}

fn student_ride_status_changed(change: &DocumentChange) -> Result<Option<FanOut>, UsecaseError> {
    let previous: BusRide = change.before_as()?;
    let ride: BusRide = change.after_as()?;
    let route = ride.route_label();

    let students: Vec<StudentTarget> = ride
        .status_changes(&previous)
        .into_iter()
        .filter_map(|(student_id, raw)| {
            let status = raw.as_deref().and_then(StudentRideStatus::parse);
            if status.is_none() {
                tracing::debug!(%student_id, status = ?raw, "ride status not notifiable");
            }
            let label = status?.label();
            Some(StudentTarget {
                student_id,
                student: Notice::new(
                    "Bus Status Update",
                    format!("Your status changed to {label} for {route}"),
                ),
                guardians: Notice::new(
                    "Child Bus Status Update",
                    format!("Status for your child changed to {label} for {route}"),
                ),
            })
        })
        .collect();

    if students.is_empty() {
        return Ok(None);
    }

    Ok(Some(FanOut {
        category: NotificationCategory::Bus,
        related_id: change.document_id.clone(),
        data: data("rideId", &change.document_id),
        students,
        teacher: None,
    }))
}

async fn homework_submitted<D: SchoolDirectory>(
    change: &DocumentChange,
    directory: &D,
) -> Result<Option<FanOut>, UsecaseError> {
    let submission: HomeworkSubmission = change.after_as()?;

    let homework = directory
        .find_homework(&submission.homework_id)
        .await?
        .ok_or_else(|| UsecaseError::NotFound(format!("homework {}", submission.homework_id)))?;
    let subject = directory
        .find_subject(&homework.subject_id)
        .await?
        .ok_or_else(|| UsecaseError::NotFound(format!("subject {}", homework.subject_id)))?;
    let teacher_id = subject
        .teacher_id
        .ok_or_else(|| UsecaseError::NotFound(format!("teacher of subject {}", homework.subject_id)))?;

    let student_name = match directory.find_user(&submission.student_id).await? {
        Some(student) => student.display_name().to_string(),
        None => "a student".to_string(),
    };

    let mut push_data = data("homeworkId", &submission.homework_id);
    push_data.insert("studentId".to_string(), submission.student_id.clone());

    Ok(Some(FanOut {
        category: NotificationCategory::HomeworkSubmission,
        related_id: submission.homework_id.clone(),
        data: push_data,
        students: Vec::new(),
        teacher: Some(TeacherTarget {
            teacher_id,
            notice: Notice::new(
                "New Homework Submission",
                format!("{student_name} has submitted homework: {}", homework.title),
            ),
        }),
    }))
}
