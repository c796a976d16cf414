mod backend;
mod records;
mod snapshot;

pub use backend::{JsonFileBackend, MemoryBackend, StorageBackend};
pub use records::{
    default_status, Course, CourseFee, CourseFeeId, CourseFeePatch, CourseId, CoursePatch,
    GeneralFee, GeneralFeeId, GeneralFeePatch, NewCourse, NewCourseFee, NewGeneralFee,
    NewStudent, PaymentMode, Student, StudentId, StudentPatch,
};
pub use snapshot::{IntegrityReport, Snapshot, StoreStats, SNAPSHOT_VERSION};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, TuitionError};
use crate::money::Money;
use crate::validation;

pub const COURSES_KEY: &str = "courses";
pub const GENERAL_FEES_KEY: &str = "generalFees";
pub const COURSE_FEES_KEY: &str = "courseFees";
pub const STUDENTS_KEY: &str = "students";

/// Collections staged for one write. Only the `Some` ones are persisted.
#[derive(Default)]
struct Changes {
    courses: Option<Vec<Course>>,
    general_fees: Option<Vec<GeneralFee>>,
    course_fees: Option<Vec<CourseFee>>,
    students: Option<Vec<Student>>,
}

/// Owns the course, fee and student collections on top of a storage backend.
///
/// Every mutation is staged on a copy, written through the backend, and only
/// then swapped in, so a failed write leaves the in-memory view unchanged.
pub struct RecordStore<B: StorageBackend> {
    backend: B,
    courses: Vec<Course>,
    general_fees: Vec<GeneralFee>,
    course_fees: Vec<CourseFee>,
    students: Vec<Student>,
}

impl<B: StorageBackend> RecordStore<B> {
    pub fn open(backend: B) -> Result<Self> {
        let courses = load_collection(&backend, COURSES_KEY)?;
        let general_fees = load_collection(&backend, GENERAL_FEES_KEY)?;
        let course_fees = load_collection(&backend, COURSE_FEES_KEY)?;
        let students = load_collection(&backend, STUDENTS_KEY)?;

        Ok(Self {
            backend,
            courses,
            general_fees,
            course_fees,
            students,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn commit(&mut self, changes: Changes) -> Result<()> {
        let mut entries = Vec::new();
        if let Some(ref v) = changes.courses {
            entries.push((COURSES_KEY, encode(COURSES_KEY, v)?));
        }
        if let Some(ref v) = changes.general_fees {
            entries.push((GENERAL_FEES_KEY, encode(GENERAL_FEES_KEY, v)?));
        }
        if let Some(ref v) = changes.course_fees {
            entries.push((COURSE_FEES_KEY, encode(COURSE_FEES_KEY, v)?));
        }
        if let Some(ref v) = changes.students {
            entries.push((STUDENTS_KEY, encode(STUDENTS_KEY, v)?));
        }

        match entries.len() {
            0 => return Ok(()),
            1 => self.backend.save(entries[0].0, &entries[0].1)?,
            _ => self.backend.save_all(&entries)?,
        }

        if let Some(v) = changes.courses {
            self.courses = v;
        }
        if let Some(v) = changes.general_fees {
            self.general_fees = v;
        }
        if let Some(v) = changes.course_fees {
            self.course_fees = v;
        }
        if let Some(v) = changes.students {
            self.students = v;
        }
        Ok(())
    }

    // Courses

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, id: &CourseId) -> Option<&Course> {
        self.courses.iter().find(|c| &c.id == id)
    }

    pub fn add_course(&mut self, data: NewCourse) -> Result<Course> {
        validation::non_negative("Monthly rate", data.monthly_rate)?;
        validation::positive_duration(data.duration_months)?;
        validation::course_total(data.monthly_rate, data.duration_months)?;

        let id = CourseId::new(next_id(CourseId::PREFIX, |id| {
            self.courses.iter().any(|c| c.id.as_str() == id)
        }));
        let course = Course {
            id,
            title: data.title,
            monthly_rate: data.monthly_rate,
            duration_months: data.duration_months,
            admission_open: data.admission_open,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut courses = self.courses.clone();
        courses.push(course.clone());
        self.commit(Changes {
            courses: Some(courses),
            ..Changes::default()
        })?;

        info!(id = %course.id, title = %course.title, "added course");
        Ok(course)
    }

    /// A new `monthly_rate` is written to the course's fee record as well.
    pub fn update_course(&mut self, id: &CourseId, patch: CoursePatch) -> Result<bool> {
        let Some(idx) = self.courses.iter().position(|c| &c.id == id) else {
            return Ok(false);
        };
        if let Some(rate) = patch.monthly_rate {
            validation::non_negative("Monthly rate", rate)?;
        }
        if let Some(months) = patch.duration_months {
            validation::positive_duration(months)?;
        }
        validation::course_total(
            patch.monthly_rate.unwrap_or(self.courses[idx].monthly_rate),
            patch.duration_months.unwrap_or(self.courses[idx].duration_months),
        )?;

        let now = Utc::now();
        let mut courses = self.courses.clone();
        let course = &mut courses[idx];
        if let Some(title) = patch.title {
            course.title = title;
        }
        if let Some(months) = patch.duration_months {
            course.duration_months = months;
        }
        if let Some(open) = patch.admission_open {
            course.admission_open = open;
        }
        if let Some(rate) = patch.monthly_rate {
            course.monthly_rate = rate;
        }
        course.updated_at = Some(now);

        let course_fees = patch.monthly_rate.map(|rate| self.fees_with_rate(id, rate, now));

        self.commit(Changes {
            courses: Some(courses),
            course_fees,
            ..Changes::default()
        })?;

        info!(%id, "updated course");
        Ok(true)
    }

    /// Removes the course only. Its fee record, if any, is left behind and
    /// shows up in [`RecordStore::validate_data`].
    pub fn delete_course(&mut self, id: &CourseId) -> Result<bool> {
        let courses: Vec<Course> = self.courses.iter().filter(|c| &c.id != id).cloned().collect();
        if courses.len() == self.courses.len() {
            return Ok(false);
        }
        self.commit(Changes {
            courses: Some(courses),
            ..Changes::default()
        })?;
        info!(%id, "deleted course");
        Ok(true)
    }

    // Course fees

    pub fn course_fees(&self) -> &[CourseFee] {
        &self.course_fees
    }

    pub fn course_fee(&self, id: &CourseFeeId) -> Option<&CourseFee> {
        self.course_fees.iter().find(|f| &f.id == id)
    }

    pub fn course_fee_for(&self, course_id: &CourseId) -> Option<&CourseFee> {
        self.course_fees.iter().find(|f| &f.course_id == course_id)
    }

    fn fees_with_rate(
        &self,
        course_id: &CourseId,
        rate: Money,
        now: chrono::DateTime<Utc>,
    ) -> Vec<CourseFee> {
        let mut fees = self.course_fees.clone();
        for fee in fees.iter_mut().filter(|f| &f.course_id == course_id) {
            fee.monthly_rate = rate;
            fee.updated_at = Some(now);
        }
        fees
    }

    fn courses_with_rate(
        &self,
        course_id: &CourseId,
        rate: Money,
        now: chrono::DateTime<Utc>,
    ) -> Option<Vec<Course>> {
        let idx = self.courses.iter().position(|c| &c.id == course_id)?;
        let mut courses = self.courses.clone();
        courses[idx].monthly_rate = rate;
        courses[idx].updated_at = Some(now);
        Some(courses)
    }

    /// Returns `Ok(None)` when the course already has a fee record; use
    /// [`RecordStore::update_course_fee`] for those.
    pub fn add_course_fee(&mut self, data: NewCourseFee) -> Result<Option<CourseFee>> {
        validation::non_negative("Monthly rate", data.monthly_rate)?;

        if self.course_fee_for(&data.course_id).is_some() {
            warn!(course = %data.course_id, "course already has a fee record");
            return Ok(None);
        }
        match self.course(&data.course_id) {
            Some(course) => {
                validation::course_total(data.monthly_rate, course.duration_months)?;
            }
            None => {
                warn!(course = %data.course_id, "adding fee for a course that does not exist");
            }
        }

        let now = Utc::now();
        let id = CourseFeeId::new(next_id(CourseFeeId::PREFIX, |id| {
            self.course_fees.iter().any(|f| f.id.as_str() == id)
        }));
        let fee = CourseFee {
            id,
            course_id: data.course_id,
            monthly_rate: data.monthly_rate,
            fee_name: data.fee_name,
            created_at: now,
            updated_at: None,
        };

        let mut course_fees = self.course_fees.clone();
        course_fees.push(fee.clone());
        let courses = self.courses_with_rate(&fee.course_id, fee.monthly_rate, now);

        self.commit(Changes {
            courses,
            course_fees: Some(course_fees),
            ..Changes::default()
        })?;

        info!(id = %fee.id, course = %fee.course_id, "added course fee");
        Ok(Some(fee))
    }

    pub fn update_course_fee(&mut self, id: &CourseFeeId, patch: CourseFeePatch) -> Result<bool> {
        let Some(idx) = self.course_fees.iter().position(|f| &f.id == id) else {
            return Ok(false);
        };
        if let Some(rate) = patch.monthly_rate {
            validation::non_negative("Monthly rate", rate)?;
            if let Some(course) = self.course(&self.course_fees[idx].course_id) {
                validation::course_total(rate, course.duration_months)?;
            }
        }

        let now = Utc::now();
        let mut course_fees = self.course_fees.clone();
        let fee = &mut course_fees[idx];
        if let Some(name) = patch.fee_name {
            fee.fee_name = name;
        }
        if let Some(rate) = patch.monthly_rate {
            fee.monthly_rate = rate;
        }
        fee.updated_at = Some(now);

        let courses = patch
            .monthly_rate
            .and_then(|rate| self.courses_with_rate(&course_fees[idx].course_id, rate, now));

        self.commit(Changes {
            courses,
            course_fees: Some(course_fees),
            ..Changes::default()
        })?;

        info!(%id, "updated course fee");
        Ok(true)
    }

    pub fn delete_course_fee(&mut self, id: &CourseFeeId) -> Result<bool> {
        let course_fees: Vec<CourseFee> = self
            .course_fees
            .iter()
            .filter(|f| &f.id != id)
            .cloned()
            .collect();
        if course_fees.len() == self.course_fees.len() {
            return Ok(false);
        }
        self.commit(Changes {
            course_fees: Some(course_fees),
            ..Changes::default()
        })?;
        info!(%id, "deleted course fee");
        Ok(true)
    }

    // General fees

    pub fn general_fees(&self) -> &[GeneralFee] {
        &self.general_fees
    }

    pub fn general_fee(&self, id: &GeneralFeeId) -> Option<&GeneralFee> {
        self.general_fees.iter().find(|f| &f.id == id)
    }

    pub fn add_general_fee(&mut self, data: NewGeneralFee) -> Result<GeneralFee> {
        validation::non_negative("Fee amount", data.amount)?;

        let id = GeneralFeeId::new(next_id(GeneralFeeId::PREFIX, |id| {
            self.general_fees.iter().any(|f| f.id.as_str() == id)
        }));
        let fee = GeneralFee {
            id,
            fee_name: data.fee_name,
            amount: data.amount,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut general_fees = self.general_fees.clone();
        general_fees.push(fee.clone());
        self.commit(Changes {
            general_fees: Some(general_fees),
            ..Changes::default()
        })?;

        info!(id = %fee.id, name = %fee.fee_name, "added fee");
        Ok(fee)
    }

    pub fn update_general_fee(&mut self, id: &GeneralFeeId, patch: GeneralFeePatch) -> Result<bool> {
        let Some(idx) = self.general_fees.iter().position(|f| &f.id == id) else {
            return Ok(false);
        };
        if let Some(amount) = patch.amount {
            validation::non_negative("Fee amount", amount)?;
        }

        let mut general_fees = self.general_fees.clone();
        let fee = &mut general_fees[idx];
        if let Some(name) = patch.fee_name {
            fee.fee_name = name;
        }
        if let Some(amount) = patch.amount {
            fee.amount = amount;
        }
        fee.updated_at = Some(Utc::now());

        self.commit(Changes {
            general_fees: Some(general_fees),
            ..Changes::default()
        })?;
        info!(%id, "updated fee");
        Ok(true)
    }

    pub fn delete_general_fee(&mut self, id: &GeneralFeeId) -> Result<bool> {
        let general_fees: Vec<GeneralFee> = self
            .general_fees
            .iter()
            .filter(|f| &f.id != id)
            .cloned()
            .collect();
        if general_fees.len() == self.general_fees.len() {
            return Ok(false);
        }
        self.commit(Changes {
            general_fees: Some(general_fees),
            ..Changes::default()
        })?;
        info!(%id, "deleted fee");
        Ok(true)
    }

    // Students

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, id: &StudentId) -> Option<&Student> {
        self.students.iter().find(|s| &s.id == id)
    }

    pub fn add_student(&mut self, data: NewStudent) -> Result<Student> {
        let id = StudentId::new(next_id(StudentId::PREFIX, |id| {
            self.students.iter().any(|s| s.id.as_str() == id)
        }));
        let student = Student {
            id,
            name: data.name,
            phone: data.phone,
            guardian_name: data.guardian_name,
            course_id: data.course_id,
            admission_date: data.admission_date,
            extra_fee_ids: data.extra_fee_ids,
            discount: data.discount,
            payment_mode: data.payment_mode,
            fee: data.fee,
            plan: data.plan,
            status: data.status,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut students = self.students.clone();
        students.push(student.clone());
        self.commit(Changes {
            students: Some(students),
            ..Changes::default()
        })?;

        info!(id = %student.id, course = %student.course_id, "admitted student");
        Ok(student)
    }

    pub fn update_student(&mut self, id: &StudentId, patch: StudentPatch) -> Result<bool> {
        let Some(idx) = self.students.iter().position(|s| &s.id == id) else {
            return Ok(false);
        };

        let mut students = self.students.clone();
        let student = &mut students[idx];
        if let Some(name) = patch.name {
            student.name = name;
        }
        if let Some(phone) = patch.phone {
            student.phone = Some(phone);
        }
        if let Some(guardian) = patch.guardian_name {
            student.guardian_name = Some(guardian);
        }
        if let Some(status) = patch.status {
            student.status = status;
        }
        student.updated_at = Some(Utc::now());

        self.commit(Changes {
            students: Some(students),
            ..Changes::default()
        })?;
        info!(%id, "updated student");
        Ok(true)
    }

    pub fn delete_student(&mut self, id: &StudentId) -> Result<bool> {
        let students: Vec<Student> = self.students.iter().filter(|s| &s.id != id).cloned().collect();
        if students.len() == self.students.len() {
            return Ok(false);
        }
        self.commit(Changes {
            students: Some(students),
            ..Changes::default()
        })?;
        info!(%id, "deleted student");
        Ok(true)
    }

    /// Apply a later payment to the paid/due summary. The stored plan is left
    /// as admitted, and an overpayment is clamped to the grand total.
    pub fn record_payment(&mut self, id: &StudentId, amount: Money) -> Result<Option<Student>> {
        validation::positive_payment(amount)?;
        let Some(idx) = self.students.iter().position(|s| &s.id == id) else {
            return Ok(None);
        };

        let mut students = self.students.clone();
        let student = &mut students[idx];
        student.fee = student
            .fee
            .with_amount_paid(student.fee.amount_paid.saturating_add(amount));
        student.updated_at = Some(Utc::now());
        let updated = student.clone();

        self.commit(Changes {
            students: Some(students),
            ..Changes::default()
        })?;

        info!(%id, %amount, due = %updated.fee.amount_due, "recorded payment");
        Ok(Some(updated))
    }

    // Integrity, snapshots, stats

    /// Report every course fee whose course no longer exists. Read-only.
    pub fn validate_data(&self) -> IntegrityReport {
        let orphaned_fees: Vec<CourseFee> = self
            .course_fees
            .iter()
            .filter(|f| self.course(&f.course_id).is_none())
            .cloned()
            .collect();

        for fee in &orphaned_fees {
            warn!(id = %fee.id, course = %fee.course_id, "course fee references a missing course");
        }

        IntegrityReport {
            is_valid: orphaned_fees.is_empty(),
            orphaned_fees,
        }
    }

    pub fn export_all_data(&self) -> Snapshot {
        Snapshot {
            courses: self.courses.clone(),
            general_fees: self.general_fees.clone(),
            course_fees: self.course_fees.clone(),
            students: self.students.clone(),
            exported_at: Utc::now(),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.export_all_data()).map_err(|source| TuitionError::Json {
            key: "snapshot".to_string(),
            source,
        })
    }

    /// Replace all four collections with the snapshot's contents. Nothing is
    /// written unless the whole document parses and checks out.
    pub fn import_all_data(&mut self, json: &str) -> Result<Snapshot> {
        let snapshot = Snapshot::parse(json)?;

        self.commit(Changes {
            courses: Some(snapshot.courses.clone()),
            general_fees: Some(snapshot.general_fees.clone()),
            course_fees: Some(snapshot.course_fees.clone()),
            students: Some(snapshot.students.clone()),
        })?;

        info!(
            courses = snapshot.courses.len(),
            fees = snapshot.general_fees.len(),
            course_fees = snapshot.course_fees.len(),
            students = snapshot.students.len(),
            "imported snapshot"
        );
        Ok(snapshot)
    }

    pub fn get_stats(&self) -> StoreStats {
        let total_revenue: Money = self.students.iter().map(|s| s.fee.grand_total).sum();
        let total_paid: Money = self.students.iter().map(|s| s.fee.amount_paid).sum();
        let total_due: Money = self.students.iter().map(|s| s.fee.amount_due).sum();

        let collection_rate_percent = if total_revenue.is_positive() {
            total_paid.minor() as f64 / total_revenue.minor() as f64 * 100.0
        } else {
            0.0
        };

        StoreStats {
            course_count: self.courses.len(),
            general_fee_count: self.general_fees.len(),
            course_fee_count: self.course_fees.len(),
            student_count: self.students.len(),
            total_revenue,
            total_paid,
            total_due,
            collection_rate_percent,
        }
    }
}

fn load_collection<B: StorageBackend, T: DeserializeOwned>(backend: &B, key: &str) -> Result<Vec<T>> {
    match backend.load(key)? {
        Some(raw) if !raw.trim().is_empty() => {
            serde_json::from_str(&raw).map_err(|source| TuitionError::Json {
                key: key.to_string(),
                source,
            })
        }
        _ => Ok(Vec::new()),
    }
}

fn encode<T: Serialize>(key: &str, items: &[T]) -> Result<String> {
    serde_json::to_string_pretty(items).map_err(|source| TuitionError::Json {
        key: key.to_string(),
        source,
    })
}

/// `<prefix>_<unix millis>`, bumped until nothing in the collection uses it
fn next_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut stamp = Utc::now().timestamp_millis();
    loop {
        let id = format!("{prefix}_{stamp}");
        if !taken(&id) {
            return id;
        }
        stamp += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{FeeBreakdown, PaymentPlan};
    use chrono::NaiveDate;

    fn store() -> RecordStore<MemoryBackend> {
        RecordStore::open(MemoryBackend::new()).unwrap()
    }

    fn new_course(rate: i64, months: i32) -> NewCourse {
        NewCourse {
            title: "Web Development".to_string(),
            monthly_rate: Money::from_major(rate),
            duration_months: months,
            admission_open: true,
        }
    }

    fn new_student(course_id: &CourseId, total: i64, paid: i64) -> NewStudent {
        let grand_total = Money::from_major(total);
        let amount_paid = Money::from_major(paid);
        NewStudent {
            name: "Asha Rao".to_string(),
            phone: None,
            guardian_name: None,
            course_id: course_id.clone(),
            admission_date: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            extra_fee_ids: Vec::new(),
            discount: None,
            payment_mode: PaymentMode::Full,
            fee: FeeBreakdown {
                course_total: grand_total,
                extras_total: Money::ZERO,
                discount_amount: Money::ZERO,
                grand_total,
                amount_paid,
                amount_due: grand_total - amount_paid,
            },
            plan: PaymentPlan::default(),
            status: default_status(),
        }
    }

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let mut store = store();
        let a = store.add_course(new_course(100, 1)).unwrap();
        let b = store.add_course(new_course(100, 1)).unwrap();

        assert_ne!(a.id, b.id);
        assert!(a.id.as_str().starts_with("course_"));
        assert_eq!(store.courses().len(), 2);
    }

    #[test]
    fn add_course_rejects_bad_input() {
        let mut store = store();
        assert!(store.add_course(new_course(-1, 3)).is_err());
        assert!(store.add_course(new_course(100, 0)).is_err());
        assert!(store.courses().is_empty());
    }

    #[test]
    fn course_totals_that_overflow_are_refused() {
        let mut store = store();
        let huge: Money = "50000000000000000".parse().unwrap();
        let err = store
            .add_course(NewCourse {
                monthly_rate: huge,
                ..new_course(0, 12)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TuitionError::InvalidInput(crate::error::InputError::AmountOverflow(_))
        ));
        assert!(store.courses().is_empty());

        let course = store.add_course(new_course(3000, 12)).unwrap();
        let patch = CoursePatch {
            monthly_rate: Some(huge),
            ..CoursePatch::default()
        };
        assert!(store.update_course(&course.id, patch).is_err());
        let fee = store
            .add_course_fee(NewCourseFee {
                course_id: course.id.clone(),
                monthly_rate: Money::from_major(3000),
                fee_name: "Tuition".to_string(),
            })
            .unwrap()
            .unwrap();
        let patch = CourseFeePatch {
            monthly_rate: Some(huge),
            ..CourseFeePatch::default()
        };
        assert!(store.update_course_fee(&fee.id, patch).is_err());
        assert_eq!(store.course(&course.id).unwrap().monthly_rate, Money::from_major(3000));
    }

    #[test]
    fn second_course_fee_for_same_course_is_refused() {
        let mut store = store();
        let course = store.add_course(new_course(3000, 3)).unwrap();

        let fee = NewCourseFee {
            course_id: course.id.clone(),
            monthly_rate: Money::from_major(2800),
            fee_name: "Tuition".to_string(),
        };
        assert!(store.add_course_fee(fee.clone()).unwrap().is_some());
        assert!(store.add_course_fee(fee).unwrap().is_none());

        let fees: Vec<_> = store
            .course_fees()
            .iter()
            .filter(|f| f.course_id == course.id)
            .collect();
        assert_eq!(fees.len(), 1);
    }

    #[test]
    fn monthly_rate_stays_in_sync_both_ways() {
        let mut store = store();
        let course = store.add_course(new_course(3000, 3)).unwrap();
        let fee = store
            .add_course_fee(NewCourseFee {
                course_id: course.id.clone(),
                monthly_rate: Money::from_major(2800),
                fee_name: "Tuition".to_string(),
            })
            .unwrap()
            .unwrap();
        assert_eq!(store.course(&course.id).unwrap().monthly_rate, Money::from_major(2800));

        store
            .update_course(
                &course.id,
                CoursePatch {
                    monthly_rate: Some(Money::from_major(3200)),
                    ..CoursePatch::default()
                },
            )
            .unwrap();
        assert_eq!(store.course_fee(&fee.id).unwrap().monthly_rate, Money::from_major(3200));

        store
            .update_course_fee(
                &fee.id,
                CourseFeePatch {
                    monthly_rate: Some(Money::from_major(2500)),
                    ..CourseFeePatch::default()
                },
            )
            .unwrap();
        assert_eq!(store.course(&course.id).unwrap().monthly_rate, Money::from_major(2500));
    }

    #[test]
    fn update_and_delete_report_missing_records() {
        let mut store = store();
        let missing = CourseId::new("course_0");
        assert!(!store.update_course(&missing, CoursePatch::default()).unwrap());
        assert!(!store.delete_course(&missing).unwrap());
        assert!(store.courses().is_empty());
    }

    #[test]
    fn update_stamps_and_merges() {
        let mut store = store();
        let fee = store
            .add_general_fee(NewGeneralFee {
                fee_name: "Admission".to_string(),
                amount: Money::from_major(500),
            })
            .unwrap();

        let found = store
            .update_general_fee(
                &fee.id,
                GeneralFeePatch {
                    amount: Some(Money::from_major(600)),
                    ..GeneralFeePatch::default()
                },
            )
            .unwrap();
        assert!(found);

        let stored = store.general_fee(&fee.id).unwrap();
        assert_eq!(stored.fee_name, "Admission");
        assert_eq!(stored.amount, Money::from_major(600));
        assert!(stored.updated_at.is_some());
    }

    #[test]
    fn deleting_course_leaves_detectable_orphan() {
        let mut store = store();
        let course = store.add_course(new_course(1000, 6)).unwrap();
        let fee = store
            .add_course_fee(NewCourseFee {
                course_id: course.id.clone(),
                monthly_rate: Money::from_major(1000),
                fee_name: "Tuition".to_string(),
            })
            .unwrap()
            .unwrap();

        assert!(store.validate_data().is_valid);

        assert!(store.delete_course(&course.id).unwrap());
        let report = store.validate_data();
        assert!(!report.is_valid);
        assert_eq!(report.orphaned_fees.len(), 1);
        assert_eq!(report.orphaned_fees[0].id, fee.id);
        assert_eq!(store.course_fees().len(), 1);

        assert!(store.delete_course_fee(&fee.id).unwrap());
        let report = store.validate_data();
        assert!(report.is_valid);
        assert!(report.orphaned_fees.is_empty());
    }

    #[test]
    fn export_import_round_trip() {
        let mut store = store();
        let course = store.add_course(new_course(1500, 4)).unwrap();
        store
            .add_general_fee(NewGeneralFee {
                fee_name: "Books".to_string(),
                amount: Money::from_major(250),
            })
            .unwrap();
        store
            .add_course_fee(NewCourseFee {
                course_id: course.id.clone(),
                monthly_rate: Money::from_major(1500),
                fee_name: "Tuition".to_string(),
            })
            .unwrap();
        store.add_student(new_student(&course.id, 6000, 1000)).unwrap();

        let before = store.export_all_data();
        let json = store.export_json().unwrap();

        let mut other = RecordStore::open(MemoryBackend::new()).unwrap();
        other.import_all_data(&json).unwrap();
        let after = other.export_all_data();

        assert_eq!(before.courses, after.courses);
        assert_eq!(before.general_fees, after.general_fees);
        assert_eq!(before.course_fees, after.course_fees);
        assert_eq!(before.students, after.students);
        assert_eq!(after.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn import_replaces_everything() {
        let mut store = store();
        store.add_course(new_course(100, 1)).unwrap();
        store
            .add_general_fee(NewGeneralFee {
                fee_name: "Books".to_string(),
                amount: Money::from_major(250),
            })
            .unwrap();

        store.import_all_data(r#"{"courses": []}"#).unwrap();
        assert!(store.courses().is_empty());
        assert!(store.general_fees().is_empty());
    }

    #[test]
    fn failed_import_leaves_store_untouched() {
        let mut store = store();
        store.add_course(new_course(100, 1)).unwrap();
        let before = store.backend().get(COURSES_KEY).map(str::to_string);

        for bad in [
            "not json",
            r#"{"students": []}"#,
            r#"{"courses": {}}"#,
            r#"{"courses": [{"id": "course_1"}]}"#,
        ] {
            let err = store.import_all_data(bad).unwrap_err();
            assert!(matches!(err, TuitionError::InvalidFormat(_)), "{bad}");
        }

        assert_eq!(store.courses().len(), 1);
        assert_eq!(store.backend().get(COURSES_KEY).map(str::to_string), before);
    }

    #[test]
    fn import_rejects_duplicate_course_fees() {
        let json = r#"{
            "courses": [],
            "courseFees": [
                {"id": "cfee_1", "courseId": "course_1", "monthlyRate": 100, "feeName": "A", "createdAt": "2026-01-01T00:00:00Z"},
                {"id": "cfee_2", "courseId": "course_1", "monthlyRate": 100, "feeName": "B", "createdAt": "2026-01-01T00:00:00Z"}
            ]
        }"#;
        let mut store = store();
        assert!(matches!(
            store.import_all_data(json),
            Err(TuitionError::InvalidFormat(_))
        ));
    }

    #[test]
    fn import_rejects_course_totals_that_overflow() {
        let json = r#"{
            "courses": [
                {"id": "course_1", "title": "Big", "monthlyRate": 9000000000000000000, "durationMonths": 12, "admissionOpen": true, "createdAt": "2026-01-01T00:00:00Z"}
            ]
        }"#;
        let mut store = store();
        assert!(matches!(
            store.import_all_data(json),
            Err(TuitionError::InvalidInput(_))
        ));
        assert!(store.courses().is_empty());
    }

    #[test]
    fn huge_payment_clamps_to_grand_total() {
        let mut store = store();
        let course = store.add_course(new_course(1000, 4)).unwrap();
        let student = store.add_student(new_student(&course.id, 4000, 1000)).unwrap();

        let updated = store
            .record_payment(&student.id, Money::from_minor(i64::MAX))
            .unwrap()
            .unwrap();
        assert_eq!(updated.fee.amount_paid, Money::from_major(4000));
        assert_eq!(updated.fee.amount_due, Money::ZERO);
    }

    #[test]
    fn stats_sum_student_totals() {
        let mut store = store();
        assert_eq!(store.get_stats().collection_rate_percent, 0.0);

        let course = store.add_course(new_course(1000, 4)).unwrap();
        store.add_student(new_student(&course.id, 4000, 1000)).unwrap();
        store.add_student(new_student(&course.id, 6000, 4000)).unwrap();

        let stats = store.get_stats();
        assert_eq!(stats.course_count, 1);
        assert_eq!(stats.student_count, 2);
        assert_eq!(stats.total_revenue, Money::from_major(10_000));
        assert_eq!(stats.total_paid, Money::from_major(5000));
        assert_eq!(stats.total_due, Money::from_major(5000));
        assert!((stats.collection_rate_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn payments_update_summary_but_not_plan() {
        let mut store = store();
        let course = store.add_course(new_course(1000, 4)).unwrap();
        let mut data = new_student(&course.id, 4000, 0);
        data.payment_mode = PaymentMode::Installments;
        data.plan = crate::billing::build_plan(
            Money::from_major(4000),
            Money::ZERO,
            4,
            data.admission_date,
            &Default::default(),
        )
        .unwrap();
        let student = store.add_student(data).unwrap();

        let updated = store
            .record_payment(&student.id, Money::from_major(1500))
            .unwrap()
            .unwrap();
        assert_eq!(updated.fee.amount_paid, Money::from_major(1500));
        assert_eq!(updated.fee.amount_due, Money::from_major(2500));
        assert_eq!(updated.plan, student.plan);

        let updated = store
            .record_payment(&student.id, Money::from_major(9000))
            .unwrap()
            .unwrap();
        assert_eq!(updated.fee.amount_paid, Money::from_major(4000));
        assert_eq!(updated.fee.amount_due, Money::ZERO);

        assert!(store
            .record_payment(&StudentId::new("student_0"), Money::from_major(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn reopening_reads_persisted_collections() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("data");

        let mut store = RecordStore::open(JsonFileBackend::new(&dir)).unwrap();
        let course = store.add_course(new_course(700, 2)).unwrap();

        let reopened = RecordStore::open(JsonFileBackend::new(&dir)).unwrap();
        assert_eq!(reopened.courses(), &[course]);
        assert!(dir.join("courses.json").exists());
    }
}
