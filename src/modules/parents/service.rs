use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_foreign_key_violation, is_unique_violation};
use rollbook_models::ids::{ParentId, StudentId, StudentParentLinkId};

use crate::modules::parents::model::{
    CreateParentDto, CreateStudentParentLinkDto, Parent, StudentParentLink,
    UpdateStudentParentLinkDto,
};

const LINK_RETURNING: &str = "id, student_id, parent_id, relationship, is_primary_contact, is_emergency_contact, can_pickup, created_at, updated_at";

pub struct ParentService;

impl ParentService {
    /// Register a parent or guardian.
    #[instrument(skip(db))]
    pub async fn create_parent(db: &PgPool, dto: CreateParentDto) -> Result<Parent, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let parent = sqlx::query_as::<_, Parent>(
            r#"INSERT INTO parents (first_name, last_name, phone, email)
               VALUES ($1, $2, $3, $4)
               RETURNING id, first_name, last_name, phone, email, created_at, updated_at"#,
        )
        .bind(&dto.first_name)
        .bind(&dto.last_name)
        .bind(&dto.phone)
        .bind(&dto.email)
        .fetch_one(db)
        .await?;

        Ok(parent)
    }

    /// Get a parent by ID.
    #[instrument(skip(db))]
    pub async fn get_parent(db: &PgPool, parent_id: ParentId) -> Result<Parent, AppError> {
        let parent = sqlx::query_as::<_, Parent>(
            r#"SELECT id, first_name, last_name, phone, email, created_at, updated_at
               FROM parents WHERE id = $1"#,
        )
        .bind(parent_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Parent not found")))?;

        Ok(parent)
    }

    /// List all parents, ordered by name.
    #[instrument(skip(db))]
    pub async fn list_parents(db: &PgPool) -> Result<Vec<Parent>, AppError> {
        let parents = sqlx::query_as::<_, Parent>(
            r#"SELECT id, first_name, last_name, phone, email, created_at, updated_at
               FROM parents
               ORDER BY last_name, first_name"#,
        )
        .fetch_all(db)
        .await?;

        Ok(parents)
    }

    /// Link a parent to a student.
    ///
    /// Each (student, parent) pair links at most once. When the new link
    /// claims the primary or emergency contact role, competing links lose it
    /// in the same transaction.
    #[instrument(skip(db))]
    pub async fn link_parent(
        db: &PgPool,
        dto: CreateStudentParentLinkDto,
    ) -> Result<StudentParentLink, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let mut tx = db.begin().await?;

        if dto.is_primary_contact {
            sqlx::query(
                r#"UPDATE student_parents
                   SET is_primary_contact = FALSE, updated_at = NOW()
                   WHERE student_id = $1 AND is_primary_contact = TRUE"#,
            )
            .bind(dto.student_id)
            .execute(&mut *tx)
            .await?;
        }
        if dto.is_emergency_contact {
            sqlx::query(
                r#"UPDATE student_parents
                   SET is_emergency_contact = FALSE, updated_at = NOW()
                   WHERE student_id = $1 AND is_emergency_contact = TRUE"#,
            )
            .bind(dto.student_id)
            .execute(&mut *tx)
            .await?;
        }

        let query = format!(
            r#"INSERT INTO student_parents
                   (student_id, parent_id, relationship, is_primary_contact, is_emergency_contact, can_pickup)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {}"#,
            LINK_RETURNING
        );
        let link = sqlx::query_as::<_, StudentParentLink>(&query)
            .bind(dto.student_id)
            .bind(dto.parent_id)
            .bind(&dto.relationship)
            .bind(dto.is_primary_contact)
            .bind(dto.is_emergency_contact)
            .bind(dto.can_pickup)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return AppError::duplicate_relationship(anyhow::anyhow!(
                        "This parent is already linked to this student"
                    ));
                }
                if is_foreign_key_violation(&e) {
                    return AppError::not_found(anyhow::anyhow!("Student or parent not found"));
                }
                AppError::from(e)
            })?;

        tx.commit().await?;

        Ok(link)
    }

    /// Update a link's kinship label or contact flags.
    ///
    /// Claiming primary or emergency contact demotes competing links in the
    /// same transaction.
    #[instrument(skip(db))]
    pub async fn update_link(
        db: &PgPool,
        link_id: StudentParentLinkId,
        dto: UpdateStudentParentLinkDto,
    ) -> Result<StudentParentLink, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let mut tx = db.begin().await?;

        let query = format!(
            "SELECT {} FROM student_parents WHERE id = $1",
            LINK_RETURNING
        );
        let existing = sqlx::query_as::<_, StudentParentLink>(&query)
            .bind(link_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Parent link not found")))?;

        if dto.is_primary_contact == Some(true) {
            sqlx::query(
                r#"UPDATE student_parents
                   SET is_primary_contact = FALSE, updated_at = NOW()
                   WHERE student_id = $1 AND id <> $2 AND is_primary_contact = TRUE"#,
            )
            .bind(existing.student_id)
            .bind(link_id)
            .execute(&mut *tx)
            .await?;
        }
        if dto.is_emergency_contact == Some(true) {
            sqlx::query(
                r#"UPDATE student_parents
                   SET is_emergency_contact = FALSE, updated_at = NOW()
                   WHERE student_id = $1 AND id <> $2 AND is_emergency_contact = TRUE"#,
            )
            .bind(existing.student_id)
            .bind(link_id)
            .execute(&mut *tx)
            .await?;
        }

        let relationship = dto.relationship.or(existing.relationship);
        let is_primary = dto.is_primary_contact.unwrap_or(existing.is_primary_contact);
        let is_emergency = dto
            .is_emergency_contact
            .unwrap_or(existing.is_emergency_contact);
        let can_pickup = dto.can_pickup.unwrap_or(existing.can_pickup);

        let query = format!(
            r#"UPDATE student_parents
               SET relationship = $1, is_primary_contact = $2, is_emergency_contact = $3,
                   can_pickup = $4, updated_at = NOW()
               WHERE id = $5
               RETURNING {}"#,
            LINK_RETURNING
        );
        let link = sqlx::query_as::<_, StudentParentLink>(&query)
            .bind(&relationship)
            .bind(is_primary)
            .bind(is_emergency)
            .bind(can_pickup)
            .bind(link_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(link)
    }

    /// Remove the link between a student and a parent. The parent record
    /// itself is untouched.
    #[instrument(skip(db))]
    pub async fn unlink_parent(
        db: &PgPool,
        student_id: StudentId,
        parent_id: ParentId,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("DELETE FROM student_parents WHERE student_id = $1 AND parent_id = $2")
                .bind(student_id)
                .bind(parent_id)
                .execute(db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!(
                "Parent link not found"
            )));
        }

        Ok(())
    }

    /// List a student's parent links with the parent records, primary
    /// contact first.
    #[instrument(skip(db))]
    pub async fn student_parents(
        db: &PgPool,
        student_id: StudentId,
    ) -> Result<Vec<(StudentParentLink, Parent)>, AppError> {
        let rows = sqlx::query_as::<_, LinkedParentRow>(
            r#"SELECT sp.id, sp.student_id, sp.parent_id, sp.relationship,
                      sp.is_primary_contact, sp.is_emergency_contact, sp.can_pickup,
                      sp.created_at, sp.updated_at,
                      p.id AS p_id, p.first_name, p.last_name, p.phone, p.email,
                      p.created_at AS p_created_at, p.updated_at AS p_updated_at
               FROM student_parents sp
               JOIN parents p ON p.id = sp.parent_id
               WHERE sp.student_id = $1
               ORDER BY sp.is_primary_contact DESC, p.last_name, p.first_name"#,
        )
            .bind(student_id)
            .fetch_all(db)
            .await?;

        Ok(rows.into_iter().map(LinkedParentRow::split).collect())
    }

    /// The student's primary contact link, if one is set.
    #[instrument(skip(db))]
    pub async fn primary_contact(
        db: &PgPool,
        student_id: StudentId,
    ) -> Result<Option<StudentParentLink>, AppError> {
        Self::contact_link(db, student_id, "is_primary_contact").await
    }

    /// The student's emergency contact link, if one is set.
    #[instrument(skip(db))]
    pub async fn emergency_contact(
        db: &PgPool,
        student_id: StudentId,
    ) -> Result<Option<StudentParentLink>, AppError> {
        Self::contact_link(db, student_id, "is_emergency_contact").await
    }

    /// Make the given parent the student's primary contact, demoting any
    /// other link that holds the flag.
    #[instrument(skip(db))]
    pub async fn set_primary_contact(
        db: &PgPool,
        student_id: StudentId,
        parent_id: ParentId,
    ) -> Result<StudentParentLink, AppError> {
        Self::set_contact_flag(db, student_id, parent_id, "is_primary_contact").await
    }

    /// Make the given parent the student's emergency contact, demoting any
    /// other link that holds the flag.
    #[instrument(skip(db))]
    pub async fn set_emergency_contact(
        db: &PgPool,
        student_id: StudentId,
        parent_id: ParentId,
    ) -> Result<StudentParentLink, AppError> {
        Self::set_contact_flag(db, student_id, parent_id, "is_emergency_contact").await
    }

    async fn set_contact_flag(
        db: &PgPool,
        student_id: StudentId,
        parent_id: ParentId,
        flag_column: &str,
    ) -> Result<StudentParentLink, AppError> {
        let mut tx = db.begin().await?;

        let clear = format!(
            r#"UPDATE student_parents
               SET {flag} = FALSE, updated_at = NOW()
               WHERE student_id = $1 AND parent_id <> $2 AND {flag} = TRUE"#,
            flag = flag_column
        );
        sqlx::query(&clear)
            .bind(student_id)
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;

        let promote = format!(
            r#"UPDATE student_parents
               SET {flag} = TRUE, updated_at = NOW()
               WHERE student_id = $1 AND parent_id = $2
               RETURNING {returning}"#,
            flag = flag_column,
            returning = LINK_RETURNING
        );
        let link = sqlx::query_as::<_, StudentParentLink>(&promote)
            .bind(student_id)
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Parent link not found")))?;

        tx.commit().await?;

        Ok(link)
    }

    async fn contact_link(
        db: &PgPool,
        student_id: StudentId,
        flag_column: &str,
    ) -> Result<Option<StudentParentLink>, AppError> {
        let query = format!(
            "SELECT {} FROM student_parents WHERE student_id = $1 AND {} = TRUE",
            LINK_RETURNING, flag_column
        );
        let link = sqlx::query_as::<_, StudentParentLink>(&query)
            .bind(student_id)
            .fetch_optional(db)
            .await?;

        Ok(link)
    }

    /// Parents authorized to pick the student up, ordered by name.
    #[instrument(skip(db))]
    pub async fn pickup_authorized(
        db: &PgPool,
        student_id: StudentId,
    ) -> Result<Vec<Parent>, AppError> {
        let parents = sqlx::query_as::<_, Parent>(
            r#"SELECT p.id, p.first_name, p.last_name, p.phone, p.email, p.created_at, p.updated_at
               FROM parents p
               JOIN student_parents sp ON sp.parent_id = p.id
               WHERE sp.student_id = $1 AND sp.can_pickup = TRUE
               ORDER BY p.last_name, p.first_name"#,
        )
        .bind(student_id)
        .fetch_all(db)
        .await?;

        Ok(parents)
    }
}

/// Flattened join row for [`ParentService::student_parents`].
#[derive(sqlx::FromRow)]
struct LinkedParentRow {
    id: StudentParentLinkId,
    student_id: StudentId,
    parent_id: ParentId,
    relationship: Option<String>,
    is_primary_contact: bool,
    is_emergency_contact: bool,
    can_pickup: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    p_id: ParentId,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    email: Option<String>,
    p_created_at: chrono::DateTime<chrono::Utc>,
    p_updated_at: chrono::DateTime<chrono::Utc>,
}

impl LinkedParentRow {
    fn split(self) -> (StudentParentLink, Parent) {
        (
            StudentParentLink {
                id: self.id,
                student_id: self.student_id,
                parent_id: self.parent_id,
                relationship: self.relationship,
                is_primary_contact: self.is_primary_contact,
                is_emergency_contact: self.is_emergency_contact,
                can_pickup: self.can_pickup,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            Parent {
                id: self.p_id,
                first_name: self.first_name,
                last_name: self.last_name,
                phone: self.phone,
                email: self.email,
                created_at: self.p_created_at,
                updated_at: self.p_updated_at,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollbook_core::ErrorKind;
    use rollbook_models::students::CreateStudentDto;

    use crate::modules::students::StudentService;

    async fn seed_student(pool: &PgPool) -> StudentId {
        StudentService::create_student(
            pool,
            CreateStudentDto {
                student_code: "STU-1".to_string(),
                first_name: "Amina".to_string(),
                last_name: "Diallo".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn seed_parent(pool: &PgPool, first: &str) -> ParentId {
        ParentService::create_parent(
            pool,
            CreateParentDto {
                first_name: first.to_string(),
                last_name: "Diallo".to_string(),
                phone: Some("+221770000000".to_string()),
                email: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn link_dto(student_id: StudentId, parent_id: ParentId) -> CreateStudentParentLinkDto {
        CreateStudentParentLinkDto {
            student_id,
            parent_id,
            relationship: Some("mother".to_string()),
            is_primary_contact: false,
            is_emergency_contact: false,
            can_pickup: false,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_link_rejected(pool: PgPool) {
        let student_id = seed_student(&pool).await;
        let parent_id = seed_parent(&pool, "Mariam").await;

        ParentService::link_parent(&pool, link_dto(student_id, parent_id))
            .await
            .unwrap();
        let err = ParentService::link_parent(&pool, link_dto(student_id, parent_id))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateRelationship);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_primary_contact_is_exclusive(pool: PgPool) {
        let student_id = seed_student(&pool).await;
        let mother = seed_parent(&pool, "Mariam").await;
        let father = seed_parent(&pool, "Ibrahim").await;

        let mut dto = link_dto(student_id, mother);
        dto.is_primary_contact = true;
        ParentService::link_parent(&pool, dto).await.unwrap();

        let mut dto = link_dto(student_id, father);
        dto.relationship = Some("father".to_string());
        dto.is_primary_contact = true;
        ParentService::link_parent(&pool, dto).await.unwrap();

        // Only the most recent claimant holds the flag.
        let primary = ParentService::primary_contact(&pool, student_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(primary.parent_id, father);

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM student_parents WHERE student_id = $1 AND is_primary_contact = TRUE",
        )
        .bind(student_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_link_transfers_emergency_flag(pool: PgPool) {
        let student_id = seed_student(&pool).await;
        let mother = seed_parent(&pool, "Mariam").await;
        let father = seed_parent(&pool, "Ibrahim").await;

        let mut dto = link_dto(student_id, mother);
        dto.is_emergency_contact = true;
        ParentService::link_parent(&pool, dto).await.unwrap();
        let father_link = ParentService::link_parent(&pool, link_dto(student_id, father))
            .await
            .unwrap();

        ParentService::update_link(
            &pool,
            father_link.id,
            UpdateStudentParentLinkDto {
                is_emergency_contact: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let emergency = ParentService::emergency_contact(&pool, student_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(emergency.parent_id, father);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_set_primary_contact_moves_flag(pool: PgPool) {
        let student_id = seed_student(&pool).await;
        let mother = seed_parent(&pool, "Mariam").await;
        let father = seed_parent(&pool, "Ibrahim").await;

        let mut dto = link_dto(student_id, mother);
        dto.is_primary_contact = true;
        ParentService::link_parent(&pool, dto).await.unwrap();
        let mut dto = link_dto(student_id, father);
        dto.relationship = Some("father".to_string());
        ParentService::link_parent(&pool, dto).await.unwrap();

        let link = ParentService::set_primary_contact(&pool, student_id, father)
            .await
            .unwrap();
        assert!(link.is_primary_contact);

        let primary = ParentService::primary_contact(&pool, student_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(primary.parent_id, father);

        let stranger = seed_parent(&pool, "Awa").await;
        let err = ParentService::set_primary_contact(&pool, student_id, stranger)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_unlink_keeps_parent_record(pool: PgPool) {
        let student_id = seed_student(&pool).await;
        let parent_id = seed_parent(&pool, "Mariam").await;

        ParentService::link_parent(&pool, link_dto(student_id, parent_id))
            .await
            .unwrap();
        ParentService::unlink_parent(&pool, student_id, parent_id)
            .await
            .unwrap();

        assert!(ParentService::get_parent(&pool, parent_id).await.is_ok());
        assert!(
            ParentService::student_parents(&pool, student_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_pickup_authorized(pool: PgPool) {
        let student_id = seed_student(&pool).await;
        let mother = seed_parent(&pool, "Mariam").await;
        let neighbor = seed_parent(&pool, "Awa").await;

        let mut dto = link_dto(student_id, mother);
        dto.can_pickup = true;
        ParentService::link_parent(&pool, dto).await.unwrap();
        let mut dto = link_dto(student_id, neighbor);
        dto.relationship = Some("guardian".to_string());
        ParentService::link_parent(&pool, dto).await.unwrap();

        let authorized = ParentService::pickup_authorized(&pool, student_id)
            .await
            .unwrap();
        assert_eq!(authorized.len(), 1);
        assert_eq!(authorized[0].id, mother);
    }
}
