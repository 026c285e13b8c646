use std::collections::HashMap;

use crate::domain::user::{Role, User};
use crate::repository::errors::RepositoryError;
use crate::usecase::contracts::SchoolDirectory;

/// Reverse index from student id to the parents listing that student as a child,
/// built from a single scan of parent users.
#[derive(Debug, Default)]
pub struct GuardianIndex {
    by_student: HashMap<String, Vec<User>>,
}

impl GuardianIndex {
    pub fn from_parents(parents: impl IntoIterator<Item = User>) -> Self {
        let mut by_student: HashMap<String, Vec<User>> = HashMap::new();

        for parent in parents.into_iter().filter(|u| u.role == Role::Parent) {
            for child in &parent.child_user_ids {
                by_student
                    .entry(child.clone())
                    .or_default()
                    .push(parent.clone());
            }
        }

        // Same guardian set regardless of scan order or repeated child ids.
        for guardians in by_student.values_mut() {
            guardians.sort_by(|a, b| a.id.cmp(&b.id));
            guardians.dedup_by(|a, b| a.id == b.id);
        }

        Self { by_student }
    }

    /// Loads every parent from the directory and indexes them by child.
    #[tracing::instrument(skip(directory))]
    pub async fn load<D: SchoolDirectory>(directory: &D) -> Result<Self, RepositoryError> {
        let parents = directory.find_users_by_role(Role::Parent).await?;
        tracing::debug!(parents = parents.len(), "parent users scanned");
        Ok(Self::from_parents(parents))
    }

    /// Parents listing `student_id` among their children, ordered by id.
    pub fn guardians_of(&self, student_id: &str) -> &[User] {
        self.by_student
            .get(student_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::contracts::MockSchoolDirectory;

    fn parent(id: &str, children: &[&str]) -> User {
        User {
            id: id.to_string(),
            role: Role::Parent,
            name: None,
            email: None,
            fcm_token: None,
            child_user_ids: children.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn ids(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn test_guardians_independent_of_scan_order() {
        let parents = vec![
            parent("p3", &["s1"]),
            parent("p1", &["s1", "s2"]),
            parent("p2", &["s2"]),
        ];
        let mut reversed = parents.clone();
        reversed.reverse();

        let forward = GuardianIndex::from_parents(parents);
        let backward = GuardianIndex::from_parents(reversed);

        assert_eq!(ids(forward.guardians_of("s1")), vec!["p1", "p3"]);
        assert_eq!(
            ids(forward.guardians_of("s1")),
            ids(backward.guardians_of("s1"))
        );
        assert_eq!(
            ids(forward.guardians_of("s2")),
            ids(backward.guardians_of("s2"))
        );
    }

    #[test]
    fn test_repeated_child_id_counts_once() {
        let index = GuardianIndex::from_parents(vec![parent("p1", &["s1", "s1"])]);
        assert_eq!(ids(index.guardians_of("s1")), vec!["p1"]);
    }

    #[test]
    fn test_non_parents_are_ignored() {
        let mut teacher = parent("t1", &["s1"]);
        teacher.role = Role::Teacher;
        let index = GuardianIndex::from_parents(vec![teacher]);
        assert!(index.guardians_of("s1").is_empty());
    }

    #[test]
    fn test_unknown_student_has_no_guardians() {
        let index = GuardianIndex::from_parents(vec![parent("p1", &["s1"])]);
        assert!(index.guardians_of("nobody").is_empty());
    }

    #[tokio::test]
    async fn test_load_scans_parents_once() {
        let mut directory = MockSchoolDirectory::new();
        directory
            .expect_find_users_by_role()
            .with(mockall::predicate::eq(Role::Parent))
            .times(1)
            .returning(|_| Ok(vec![parent("p1", &["s1"]), parent("p2", &["s2"])]));

        let index = GuardianIndex::load(&directory).await.unwrap();
        assert_eq!(ids(index.guardians_of("s2")), vec!["p2"]);
    }

    #[tokio::test]
    async fn test_load_propagates_store_failure() {
        let mut directory = MockSchoolDirectory::new();
        directory
            .expect_find_users_by_role()
            .times(1)
            .returning(|_| Err(RepositoryError::DatabaseError("connection reset".to_string())));

        let result = GuardianIndex::load(&directory).await;
        tokio_test::assert_err!(result);
    }
}
